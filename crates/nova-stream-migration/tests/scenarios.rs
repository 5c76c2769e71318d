//! Whole-file rewrites through the public inspection API.

use nova_stream_migration::{apply_text_edits, InspectionOptions, StreamApiMigrationInspection};
use nova_types::Severity;
use pretty_assertions::assert_eq;

/// Applies the first fix of the first finding.
fn fix_first(text: &str) -> String {
    let findings = StreamApiMigrationInspection::default().check_text(text);
    let finding = findings.first().expect("a finding");
    apply_text_edits(text, &finding.fixes[0].edits).expect("valid edits")
}

#[test]
fn any_match_replaces_loop_and_trailing_return() {
    let text = "class A {
    boolean m(java.util.List<String> list) {
        for (String s : list) {
            if (s.isEmpty()) return true;
        }
        return false;
    }
}
";
    assert_eq!(
        fix_first(text),
        "class A {
    boolean m(java.util.List<String> list) {
        return list.stream().anyMatch(s -> s.isEmpty());
    }
}
"
    );
}

#[test]
fn count_folds_into_declaration() {
    let text = "class A {
    int m(java.util.List<String> list) {
        int c = 0;
        for (String s : list) {
            if (s.isEmpty()) c++;
        }
        return c;
    }
}
";
    assert_eq!(
        fix_first(text),
        "class A {
    int m(java.util.List<String> list) {
        int c = (int) list.stream().filter(s -> s.isEmpty()).count();
        return c;
    }
}
"
    );
}

#[test]
fn joining_adds_collectors_import() {
    let text = "class A {
    String m(java.util.List<String> list) {
        StringBuilder sb = new StringBuilder();
        for (String s : list) {
            if (sb.length() > 0) sb.append(\",\");
            sb.append(s);
        }
        return sb.toString();
    }
}
";
    assert_eq!(
        fix_first(text),
        "import java.util.stream.Collectors;

class A {
    String m(java.util.List<String> list) {
        String sb = list.stream().collect(Collectors.joining(\",\"));
        return sb;
    }
}
"
    );
}

#[test]
fn outer_loop_is_reported_first() {
    let text = "import java.util.*;

class A {
    int m(List<List<String>> lists) {
        int c = 0;
        for (List<String> list : lists) {
            for (String s : list) {
                if (s.isEmpty()) c++;
            }
        }
        return c;
    }
}
";
    let findings = StreamApiMigrationInspection::default().check_text(text);
    let first = findings.first().expect("a finding");
    let outer = text.find("for (List").expect("outer loop");
    assert_eq!(first.diagnostic.span.map(|s| s.start), Some(outer));
    assert_eq!(first.diagnostic.severity, Severity::Warning);
    let fixed = apply_text_edits(text, &first.fixes[0].edits).expect("valid edits");
    assert!(
        fixed.contains("int c = (int) lists.stream().flatMap(list -> list.stream()).filter(s -> s.isEmpty()).count();"),
        "{fixed}"
    );
}

#[test]
fn language_level_gates_take_while() {
    let text = "class A {
    java.util.List<String> m(java.util.List<String> list) {
        java.util.List<String> out = new java.util.ArrayList<>();
        for (String s : list) {
            if (s.isEmpty()) break;
            out.add(s);
        }
        return out;
    }
}
";
    assert!(StreamApiMigrationInspection::default().check_text(text).is_empty());

    let inspection = StreamApiMigrationInspection::new(InspectionOptions {
        language_level: nova_syntax::JavaLanguageLevel::JAVA_9,
        ..InspectionOptions::default()
    });
    let findings = inspection.check_text(text);
    assert_eq!(findings.len(), 1);
    let fixed = apply_text_edits(text, &findings[0].fixes[0].edits).expect("valid edits");
    assert!(fixed.contains(".takeWhile(s -> !s.isEmpty())"), "{fixed}");
}

#[test]
fn loops_without_a_stream_form_are_left_alone() {
    let text = "class A {
    void m(java.util.List<String> list) {
        for (String s : list) {
            if (s.isEmpty()) continue;
            list.remove(s);
            return;
        }
    }
}
";
    assert!(StreamApiMigrationInspection::default().check_text(text).is_empty());
}
