//! A structural Java type model.
//!
//! Types are parsed from the text written in source (`List<String>`,
//! `int[]`, `java.util.Map<K, V>`). There is no classpath behind this model:
//! class types are compared by simple name and well-known JDK types are
//! recognised by name only. Anything that cannot be understood becomes
//! [`JavaType::Unknown`], which every consumer must treat as "no match".

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    pub fn from_keyword(text: &str) -> Option<Self> {
        Some(match text {
            "boolean" => PrimitiveType::Boolean,
            "byte" => PrimitiveType::Byte,
            "short" => PrimitiveType::Short,
            "char" => PrimitiveType::Char,
            "int" => PrimitiveType::Int,
            "long" => PrimitiveType::Long,
            "float" => PrimitiveType::Float,
            "double" => PrimitiveType::Double,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Short => "short",
            PrimitiveType::Char => "char",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }

    pub fn box_name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Byte => "Byte",
            PrimitiveType::Short => "Short",
            PrimitiveType::Char => "Character",
            PrimitiveType::Int => "Integer",
            PrimitiveType::Long => "Long",
            PrimitiveType::Float => "Float",
            PrimitiveType::Double => "Double",
        }
    }

    pub fn from_box_name(name: &str) -> Option<Self> {
        let simple = name.rsplit('.').next().unwrap_or(name);
        Some(match simple {
            "Boolean" => PrimitiveType::Boolean,
            "Byte" => PrimitiveType::Byte,
            "Short" => PrimitiveType::Short,
            "Character" => PrimitiveType::Char,
            "Integer" => PrimitiveType::Int,
            "Long" => PrimitiveType::Long,
            "Float" => PrimitiveType::Float,
            "Double" => PrimitiveType::Double,
            _ => return None,
        })
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveType::Boolean)
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveType::Byte
                | PrimitiveType::Short
                | PrimitiveType::Char
                | PrimitiveType::Int
                | PrimitiveType::Long
        )
    }

    /// Rank used for binary numeric promotion.
    fn promotion_rank(self) -> u8 {
        match self {
            PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Char | PrimitiveType::Int => 0,
            PrimitiveType::Long => 1,
            PrimitiveType::Float => 2,
            PrimitiveType::Double => 3,
            PrimitiveType::Boolean => 4,
        }
    }

    /// Result type of a binary arithmetic operation (JLS 5.6.2).
    pub fn promote(self, other: PrimitiveType) -> Option<PrimitiveType> {
        if !self.is_numeric() || !other.is_numeric() {
            return None;
        }
        Some(match self.promotion_rank().max(other.promotion_rank()) {
            0 => PrimitiveType::Int,
            1 => PrimitiveType::Long,
            2 => PrimitiveType::Float,
            _ => PrimitiveType::Double,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum JavaType {
    Primitive(PrimitiveType),
    /// A class or interface type; `name` is written as in source (possibly qualified).
    Class { name: String, args: Vec<JavaType> },
    Array(Box<JavaType>),
    /// `?`, `? extends T`, `? super T`; only the bound is kept.
    Wildcard(Option<Box<JavaType>>),
    Void,
    Null,
    Unknown,
}

impl JavaType {
    pub const INT: JavaType = JavaType::Primitive(PrimitiveType::Int);
    pub const LONG: JavaType = JavaType::Primitive(PrimitiveType::Long);
    pub const DOUBLE: JavaType = JavaType::Primitive(PrimitiveType::Double);
    pub const BOOLEAN: JavaType = JavaType::Primitive(PrimitiveType::Boolean);
    pub const CHAR: JavaType = JavaType::Primitive(PrimitiveType::Char);

    pub fn class(name: impl Into<String>, args: Vec<JavaType>) -> JavaType {
        JavaType::Class {
            name: name.into(),
            args,
        }
    }

    pub fn string() -> JavaType {
        JavaType::class("String", Vec::new())
    }

    /// Parses a type as written in source. Never fails; unparsable input is `Unknown`.
    pub fn parse(text: &str) -> JavaType {
        let mut parser = TypeTextParser {
            chars: text.trim().chars().collect(),
            pos: 0,
        };
        let Some(ty) = parser.parse_type() else {
            return JavaType::Unknown;
        };
        parser.skip_ws();
        if parser.pos == parser.chars.len() {
            ty
        } else {
            JavaType::Unknown
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, JavaType::Unknown)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            JavaType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, JavaType::Primitive(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            JavaType::Class { .. } | JavaType::Array(_) | JavaType::Wildcard(_) | JavaType::Null
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self, JavaType::Array(_))
    }

    /// Simple (unqualified) class name, if this is a class type.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            JavaType::Class { name, .. } => Some(name.rsplit('.').next().unwrap_or(name)),
            JavaType::Wildcard(Some(bound)) => bound.class_name(),
            _ => None,
        }
    }

    pub fn is_class(&self, simple_name: &str) -> bool {
        self.class_name() == Some(simple_name)
    }

    pub fn type_args(&self) -> &[JavaType] {
        match self {
            JavaType::Class { args, .. } => args,
            JavaType::Wildcard(Some(bound)) => bound.type_args(),
            _ => &[],
        }
    }

    pub fn type_arg(&self, idx: usize) -> JavaType {
        self.type_args()
            .get(idx)
            .map(JavaType::wildcard_bound)
            .unwrap_or(JavaType::Unknown)
    }

    fn wildcard_bound(&self) -> JavaType {
        match self {
            JavaType::Wildcard(Some(bound)) => (**bound).clone(),
            JavaType::Wildcard(None) => JavaType::class("Object", Vec::new()),
            other => other.clone(),
        }
    }

    pub fn is_string(&self) -> bool {
        self.is_class("String")
    }

    pub fn is_char_sequence(&self) -> bool {
        matches!(
            self.class_name(),
            Some("String" | "StringBuilder" | "StringBuffer" | "CharSequence")
        )
    }

    pub fn is_string_builder(&self) -> bool {
        matches!(self.class_name(), Some("StringBuilder" | "StringBuffer"))
    }

    /// `int` for `Integer`, the primitive itself for a primitive.
    pub fn unboxed(&self) -> Option<PrimitiveType> {
        match self {
            JavaType::Primitive(p) => Some(*p),
            JavaType::Class { name, args } if args.is_empty() => PrimitiveType::from_box_name(name),
            _ => None,
        }
    }

    /// `Integer` for `int`, the type itself otherwise.
    pub fn boxed(&self) -> JavaType {
        match self {
            JavaType::Primitive(p) => JavaType::class(p.box_name(), Vec::new()),
            other => other.clone(),
        }
    }

    pub fn array_component(&self) -> Option<&JavaType> {
        match self {
            JavaType::Array(component) => Some(component),
            _ => None,
        }
    }

    /// Whether a value of this type can flow through a `Stream`, `IntStream`,
    /// `LongStream` or `DoubleStream` without a conversion the pipeline cannot express.
    pub fn is_stream_eligible(&self) -> bool {
        match self {
            JavaType::Primitive(p) => matches!(
                p,
                PrimitiveType::Int | PrimitiveType::Long | PrimitiveType::Double
            ),
            JavaType::Class { .. } | JavaType::Array(_) => true,
            _ => false,
        }
    }

    /// Element type produced when iterating this type with an enhanced `for`.
    pub fn iterable_element(&self) -> JavaType {
        match self {
            JavaType::Array(component) => (**component).clone(),
            JavaType::Class { .. } if self.is_collection_like() => match self.class_name() {
                Some("Map") | Some("HashMap") | Some("TreeMap") | Some("LinkedHashMap") => {
                    JavaType::Unknown
                }
                _ => self.type_arg(0),
            },
            _ => JavaType::Unknown,
        }
    }

    pub fn is_collection_like(&self) -> bool {
        matches!(
            self.class_name(),
            Some(
                "Iterable"
                    | "Collection"
                    | "List"
                    | "ArrayList"
                    | "LinkedList"
                    | "Set"
                    | "HashSet"
                    | "LinkedHashSet"
                    | "TreeSet"
                    | "SortedSet"
                    | "NavigableSet"
                    | "Queue"
                    | "Deque"
                    | "ArrayDeque"
                    | "PriorityQueue"
                    | "CopyOnWriteArrayList"
            )
        )
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection_like() && !self.is_class("Iterable")
    }

    pub fn is_map(&self) -> bool {
        matches!(
            self.class_name(),
            Some(
                "Map"
                    | "HashMap"
                    | "LinkedHashMap"
                    | "TreeMap"
                    | "SortedMap"
                    | "NavigableMap"
                    | "ConcurrentHashMap"
                    | "ConcurrentMap"
                    | "EnumMap"
                    | "IdentityHashMap"
            )
        )
    }

    /// Name of the stream class carrying elements of this type.
    pub fn stream_class(&self) -> &'static str {
        match self.as_primitive() {
            Some(PrimitiveType::Int) => "IntStream",
            Some(PrimitiveType::Long) => "LongStream",
            Some(PrimitiveType::Double) => "DoubleStream",
            _ => "Stream",
        }
    }

    /// The type as it would be written in a declaration.
    pub fn display(&self) -> String {
        self.to_string()
    }

    /// Same type ignoring qualification of class names.
    pub fn same_as(&self, other: &JavaType) -> bool {
        match (self, other) {
            (JavaType::Primitive(a), JavaType::Primitive(b)) => a == b,
            (JavaType::Class { args: a, .. }, JavaType::Class { args: b, .. }) => {
                self.class_name() == other.class_name()
                    && (a.is_empty()
                        || b.is_empty()
                        || (a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))))
            }
            (JavaType::Array(a), JavaType::Array(b)) => a.same_as(b),
            (JavaType::Wildcard(a), JavaType::Wildcard(b)) => match (a, b) {
                (Some(a), Some(b)) => a.same_as(b),
                (None, None) => true,
                _ => false,
            },
            (JavaType::Void, JavaType::Void) | (JavaType::Null, JavaType::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Primitive(p) => f.write_str(p.keyword()),
            JavaType::Class { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (idx, arg) in args.iter().enumerate() {
                        if idx > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            JavaType::Array(component) => write!(f, "{component}[]"),
            JavaType::Wildcard(None) => f.write_str("?"),
            JavaType::Wildcard(Some(bound)) => write!(f, "? extends {bound}"),
            JavaType::Void => f.write_str("void"),
            JavaType::Null => f.write_str("null"),
            JavaType::Unknown => f.write_str("Object"),
        }
    }
}

struct TypeTextParser {
    chars: Vec<char>,
    pos: usize,
}

impl TypeTextParser {
    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.chars.get(self.pos) == Some(&c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }

    fn skip_annotations(&mut self) {
        while self.eat('@') {
            let _ = self.ident();
        }
    }

    fn parse_type(&mut self) -> Option<JavaType> {
        self.skip_annotations();
        if self.eat('?') {
            let save = self.pos;
            let bound = match self.ident().as_deref() {
                Some("extends") => Some(Box::new(self.parse_type()?)),
                Some("super") => {
                    self.parse_type()?;
                    None
                }
                _ => {
                    self.pos = save;
                    None
                }
            };
            return Some(JavaType::Wildcard(bound));
        }

        let first = self.ident()?;
        let mut ty = if let Some(p) = PrimitiveType::from_keyword(&first) {
            JavaType::Primitive(p)
        } else if first == "void" {
            JavaType::Void
        } else {
            let mut name = first;
            let mut args = Vec::new();
            loop {
                if self.eat('<') {
                    args.clear();
                    if !self.eat('>') {
                        loop {
                            args.push(self.parse_type()?);
                            if self.eat(',') {
                                continue;
                            }
                            if self.eat('>') {
                                break;
                            }
                            return None;
                        }
                    }
                }
                let save = self.pos;
                if self.eat('.') {
                    // Varargs `...` is handled below.
                    if self.chars.get(self.pos) == Some(&'.') {
                        self.pos = save;
                        break;
                    }
                    let part = self.ident()?;
                    name.push('.');
                    name.push_str(&part);
                    continue;
                }
                break;
            }
            JavaType::Class { name, args }
        };

        loop {
            self.skip_annotations();
            let save = self.pos;
            if self.eat('[') {
                if self.eat(']') {
                    ty = JavaType::Array(Box::new(ty));
                    continue;
                }
                self.pos = save;
                break;
            }
            if self.eat('.') && self.eat('.') && self.eat('.') {
                ty = JavaType::Array(Box::new(ty));
                continue;
            }
            self.pos = save;
            break;
        }
        Some(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_generic_and_array_types() {
        let ty = JavaType::parse("Map<String, List<Integer>>");
        assert_eq!(ty.class_name(), Some("Map"));
        assert_eq!(ty.type_arg(1).class_name(), Some("List"));
        assert_eq!(ty.type_arg(1).type_arg(0).unboxed(), Some(PrimitiveType::Int));
        assert_eq!(ty.to_string(), "Map<String, List<Integer>>");

        let arr = JavaType::parse("int[][]");
        assert_eq!(arr.to_string(), "int[][]");
        assert_eq!(arr.iterable_element(), JavaType::parse("int[]"));

        assert_eq!(JavaType::parse("String..."), JavaType::parse("String[]"));
    }

    #[test]
    fn qualified_names_compare_by_simple_name() {
        let qualified = JavaType::parse("java.util.List<java.lang.String>");
        assert!(qualified.same_as(&JavaType::parse("List<String>")));
        assert!(qualified.is_collection());
        assert!(qualified.iterable_element().is_string());
    }

    #[test]
    fn wildcards_expose_their_bound() {
        let ty = JavaType::parse("List<? extends Number>");
        assert_eq!(ty.iterable_element().class_name(), Some("Number"));
        assert_eq!(JavaType::parse("List<?>").iterable_element().class_name(), Some("Object"));
    }

    #[test]
    fn garbage_is_unknown() {
        assert_eq!(JavaType::parse("List<"), JavaType::Unknown);
        assert_eq!(JavaType::parse(""), JavaType::Unknown);
    }

    #[test]
    fn numeric_promotion() {
        assert_eq!(
            PrimitiveType::Char.promote(PrimitiveType::Short),
            Some(PrimitiveType::Int)
        );
        assert_eq!(
            PrimitiveType::Int.promote(PrimitiveType::Double),
            Some(PrimitiveType::Double)
        );
        assert_eq!(PrimitiveType::Boolean.promote(PrimitiveType::Int), None);
    }

    #[test]
    fn stream_classes() {
        assert_eq!(JavaType::INT.stream_class(), "IntStream");
        assert_eq!(JavaType::string().stream_class(), "Stream");
        assert!(!JavaType::Primitive(PrimitiveType::Float).is_stream_eligible());
    }
}
