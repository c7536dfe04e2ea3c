//! Document AST as emitted by `<compiler> ast <path>`.
//!
//! ```json
//! { "body": [
//!     { "kind": "import", "source": "../components/layout", "names": ["Layout"] },
//!     { "kind": "element", "name": "Layout",
//!       "props": [{ "name": "title", "value": { "type": "str", "value": "Home" } }],
//!       "children": [] }
//! ] }
//! ```
//!
//! Traversal is explicit: a [`Visitor`] decides per node whether to descend by
//! calling the matching `walk_*` function. Nothing recurses on its own.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ast {
    #[serde(default)]
    pub body: Vec<Node>,
}

impl Ast {
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Top-level statement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Import(Import),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Import {
    /// Specifier as written, e.g. `../components/layout`
    pub source: String,
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(default)]
    pub props: Vec<Prop>,
    #[serde(default)]
    pub children: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prop {
    pub name: String,
    pub value: Value,
}

/// Property or child value. Closed: every literal kind has its own variant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Element(Box<Element>),
}

impl Value {
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bool(_) => "bool",
            Self::Null => "null",
            Self::Element(_) => "element",
        }
    }
}

// ============================================================================
// Visitor
// ============================================================================

/// Borrowed view of any visitable node, for [`Visitor::visit_default`].
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Import(&'a Import),
    Element(&'a Element),
    Prop(&'a Prop),
    Value(&'a Value),
}

/// AST visitor.
///
/// Every `visit_*` method falls back to the required `visit_default`. None of
/// them descend into children; implementations call `walk_*` to do so.
pub trait Visitor {
    fn visit_default(&mut self, node: NodeRef<'_>);

    fn visit_import(&mut self, import: &Import) {
        self.visit_default(NodeRef::Import(import));
    }

    fn visit_element(&mut self, element: &Element) {
        self.visit_default(NodeRef::Element(element));
    }

    fn visit_prop(&mut self, prop: &Prop) {
        self.visit_default(NodeRef::Prop(prop));
    }

    fn visit_value(&mut self, value: &Value) {
        self.visit_default(NodeRef::Value(value));
    }
}

/// Visit every top-level statement.
pub fn walk_ast<V: Visitor + ?Sized>(visitor: &mut V, ast: &Ast) {
    for node in &ast.body {
        match node {
            Node::Import(import) => visitor.visit_import(import),
            Node::Element(element) => visitor.visit_element(element),
        }
    }
}

/// Visit an element's props, then its children.
pub fn walk_element<V: Visitor + ?Sized>(visitor: &mut V, element: &Element) {
    for prop in &element.props {
        visitor.visit_prop(prop);
    }
    for child in &element.children {
        visitor.visit_value(child);
    }
}

pub fn walk_prop<V: Visitor + ?Sized>(visitor: &mut V, prop: &Prop) {
    visitor.visit_value(&prop.value);
}

/// Nested elements are visited; scalars have nothing below them.
pub fn walk_value<V: Visitor + ?Sized>(visitor: &mut V, value: &Value) {
    match value {
        Value::Element(element) => visitor.visit_element(element),
        Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Bool(_) | Value::Null => {}
    }
}

/// Collects import specifiers in source order, without duplicates.
#[derive(Debug, Default)]
pub struct ImportCollector {
    pub sources: Vec<String>,
}

impl ImportCollector {
    pub fn collect(ast: &Ast) -> Vec<String> {
        let mut collector = Self::default();
        walk_ast(&mut collector, ast);
        collector.sources
    }
}

impl Visitor for ImportCollector {
    fn visit_default(&mut self, _node: NodeRef<'_>) {}

    fn visit_import(&mut self, import: &Import) {
        if !self.sources.contains(&import.source) {
            self.sources.push(import.source.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = r#"{
        "body": [
            { "kind": "import", "source": "../components/layout", "names": ["Layout"] },
            { "kind": "import", "source": "./hero.jml" },
            { "kind": "import", "source": "../components/layout" },
            { "kind": "element", "name": "Layout",
              "props": [
                { "name": "title", "value": { "type": "str", "value": "Home" } },
                { "name": "count", "value": { "type": "int", "value": 3 } },
                { "name": "ratio", "value": { "type": "float", "value": 0.5 } },
                { "name": "draft", "value": { "type": "bool", "value": false } },
                { "name": "extra", "value": { "type": "null" } }
              ],
              "children": [
                { "type": "element", "value": { "name": "Hero", "children": [
                    { "type": "str", "value": "hi" }
                ] } }
              ] }
        ]
    }"#;

    #[test]
    fn test_parse_values() {
        let ast = Ast::parse(HOME).unwrap();
        assert_eq!(ast.body.len(), 4);
        let Node::Element(layout) = &ast.body[3] else {
            panic!("expected element");
        };
        let kinds: Vec<_> = layout.props.iter().map(|p| p.value.type_name()).collect();
        assert_eq!(kinds, ["str", "int", "float", "bool", "null"]);
        assert_eq!(layout.props[1].value, Value::Int(3));
        assert!(matches!(&layout.children[0], Value::Element(e) if e.name == "Hero"));
    }

    #[test]
    fn test_import_collector_dedups_in_order() {
        let ast = Ast::parse(HOME).unwrap();
        assert_eq!(
            ImportCollector::collect(&ast),
            vec!["../components/layout".to_string(), "./hero.jml".to_string()]
        );
    }

    #[test]
    fn test_visitor_descends_only_when_walked() {
        #[derive(Default)]
        struct Elements {
            names: Vec<String>,
            deep: bool,
        }
        impl Visitor for Elements {
            fn visit_default(&mut self, _node: NodeRef<'_>) {}
            fn visit_element(&mut self, element: &Element) {
                self.names.push(element.name.clone());
                if self.deep {
                    walk_element(self, element);
                }
            }
            fn visit_value(&mut self, value: &Value) {
                walk_value(self, value);
            }
        }

        let ast = Ast::parse(HOME).unwrap();

        let mut shallow = Elements::default();
        walk_ast(&mut shallow, &ast);
        assert_eq!(shallow.names, ["Layout"]);

        let mut deep = Elements {
            deep: true,
            ..Default::default()
        };
        walk_ast(&mut deep, &ast);
        assert_eq!(deep.names, ["Layout", "Hero"]);
    }

    #[test]
    fn test_default_receives_unhandled_nodes() {
        #[derive(Default)]
        struct Count(usize);
        impl Visitor for Count {
            fn visit_default(&mut self, _node: NodeRef<'_>) {
                self.0 += 1;
            }
        }

        let ast = Ast::parse(HOME).unwrap();
        let mut count = Count::default();
        walk_ast(&mut count, &ast);
        assert_eq!(count.0, 4);
    }

    #[test]
    fn test_unknown_value_type_rejected() {
        let json = r#"{ "body": [ { "kind": "element", "name": "X",
            "props": [{ "name": "a", "value": { "type": "date", "value": "2024" } }] } ] }"#;
        assert!(Ast::parse(json).is_err());
    }
}
