//! A tiny typed model of a fluent stream call chain.
//!
//! Operations and terminals append steps to a [`PipelineCall`]; the chain is
//! printed once at the end. Arguments are already-rendered Java source.

use std::fmt;

use nova_types::{JavaType, PrimitiveType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineCall {
    pub receiver: String,
    pub steps: Vec<PipelineStep>,
}

impl PipelineCall {
    pub fn new(receiver: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
            steps: Vec::new(),
        }
    }

    /// A call on a class, e.g. `IntStream.range(0, n)`.
    pub fn static_call(class: &str, name: &str, args: Vec<String>) -> Self {
        let mut call = Self::new(class);
        call.push(name, args);
        call
    }

    pub fn push(&mut self, name: impl Into<String>, args: Vec<String>) {
        self.steps.push(PipelineStep {
            name: name.into(),
            args,
        });
    }

    #[must_use]
    pub fn call(mut self, name: impl Into<String>, args: Vec<String>) -> Self {
        self.push(name, args);
        self
    }

    pub fn extend(&mut self, steps: impl IntoIterator<Item = PipelineStep>) {
        self.steps.extend(steps);
    }

    pub fn last_step(&self) -> Option<&PipelineStep> {
        self.steps.last()
    }
}

impl fmt::Display for PipelineCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.receiver)?;
        for step in &self.steps {
            write!(f, ".{}({})", step.name, step.args.join(", "))?;
        }
        Ok(())
    }
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// `param -> body`.
pub fn lambda(param: &str, body: &str) -> String {
    format!("{param} -> {body}")
}

/// The step converting a stream of `in_ty` elements named `var` into a
/// stream of `out_ty` produced by `expr`. `expr_is_var` marks the identity
/// mapping, which only changes the stream kind.
///
/// Returns no step when nothing changes.
pub fn map_step(
    var: &str,
    in_ty: &JavaType,
    out_ty: &JavaType,
    expr: &str,
    expr_is_var: bool,
) -> Vec<PipelineStep> {
    let in_prim = stream_primitive(in_ty);
    let out_prim = stream_primitive(out_ty);
    let body = lambda(var, expr);
    match (in_prim, out_prim) {
        (None, None) => {
            if expr_is_var {
                Vec::new()
            } else {
                vec![PipelineStep::new("map", vec![body])]
            }
        }
        (None, Some(out)) => vec![PipelineStep::new(map_to(out), vec![body])],
        (Some(_), None) => {
            if expr_is_var {
                vec![PipelineStep::new("boxed", Vec::new())]
            } else {
                vec![PipelineStep::new("mapToObj", vec![body])]
            }
        }
        (Some(a), Some(b)) if a == b => {
            if expr_is_var {
                Vec::new()
            } else {
                vec![PipelineStep::new("map", vec![body])]
            }
        }
        (Some(PrimitiveType::Int), Some(PrimitiveType::Long)) if expr_is_var => {
            vec![PipelineStep::new("asLongStream", Vec::new())]
        }
        (Some(PrimitiveType::Int | PrimitiveType::Long), Some(PrimitiveType::Double))
            if expr_is_var =>
        {
            vec![PipelineStep::new("asDoubleStream", Vec::new())]
        }
        (Some(_), Some(out)) => vec![PipelineStep::new(map_to(out), vec![body])],
    }
}

/// The primitive carried by a specialized stream of `ty`, if any.
pub fn stream_primitive(ty: &JavaType) -> Option<PrimitiveType> {
    match ty.as_primitive() {
        Some(p @ (PrimitiveType::Int | PrimitiveType::Long | PrimitiveType::Double)) => Some(p),
        _ => None,
    }
}

fn map_to(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::Long => "mapToLong",
        PrimitiveType::Double => "mapToDouble",
        _ => "mapToInt",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(steps: Vec<PipelineStep>) -> String {
        let mut call = PipelineCall::new("s");
        call.extend(steps);
        call.to_string()
    }

    #[test]
    fn prints_steps_in_order() {
        let call = PipelineCall::new("list")
            .call("stream", Vec::new())
            .call("filter", vec![lambda("s", "s.isEmpty()")])
            .call("collect", vec!["Collectors.toList()".into()]);
        assert_eq!(
            call.to_string(),
            "list.stream().filter(s -> s.isEmpty()).collect(Collectors.toList())"
        );
    }

    #[test]
    fn map_step_picks_the_stream_conversion() {
        let string = JavaType::string();
        assert_eq!(render(map_step("x", &string, &string, "x", true)), "s");
        assert_eq!(
            render(map_step("x", &string, &string, "x.trim()", false)),
            "s.map(x -> x.trim())"
        );
        assert_eq!(
            render(map_step("x", &string, &JavaType::INT, "x.length()", false)),
            "s.mapToInt(x -> x.length())"
        );
        assert_eq!(render(map_step("i", &JavaType::INT, &string, "i", true)), "s.boxed()");
        assert_eq!(
            render(map_step("i", &JavaType::INT, &JavaType::LONG, "i", true)),
            "s.asLongStream()"
        );
        assert_eq!(
            render(map_step("i", &JavaType::LONG, &JavaType::DOUBLE, "i", true)),
            "s.asDoubleStream()"
        );
        assert_eq!(
            render(map_step("i", &JavaType::INT, &JavaType::LONG, "i * 2L", false)),
            "s.mapToLong(i -> i * 2L)"
        );
        assert_eq!(
            render(map_step("i", &JavaType::INT, &string, "names[i]", false)),
            "s.mapToObj(i -> names[i])"
        );
    }
}
