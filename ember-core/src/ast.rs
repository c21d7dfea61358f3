use std::rc::Rc;

use crate::lexer::Literal;
use crate::span::Location;

/// A located AST node. The location always covers every child.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Comment(String),
    Literal(Literal),
    Identifier(String),
    Assignment {
        name: String,
        value: Box<Node>,
    },
    /// Shared with every closure created from it.
    Function(Rc<FunctionDef>),
    /// `callee` is an identifier or, for binary operations, the operator.
    Call {
        callee: String,
        args: Vec<Node>,
    },
    /// Always wraps a [`NodeKind::StatementList`].
    Block(Box<Node>),
    List(Vec<Node>),
    StatementList(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub params: Vec<String>,
    pub body: Node,
}

impl Node {
    pub fn new(kind: NodeKind, location: Location) -> Self {
        Node { kind, location }
    }

    /// Direct children, in source order.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Comment(_) | NodeKind::Literal(_) | NodeKind::Identifier(_) => Vec::new(),
            NodeKind::Assignment { value, .. } => vec![value],
            NodeKind::Function(def) => vec![&def.body],
            NodeKind::Block(body) => vec![body],
            NodeKind::Call { args: nodes, .. }
            | NodeKind::List(nodes)
            | NodeKind::StatementList(nodes) => nodes.iter().collect(),
        }
    }

    /// Variant structure with locations and payloads erased, e.g.
    /// `call(+)[identifier, literal]`.
    pub fn shape(&self) -> String {
        let head = match &self.kind {
            NodeKind::Comment(_) => "comment".to_string(),
            NodeKind::Literal(_) => "literal".to_string(),
            NodeKind::Identifier(_) => "identifier".to_string(),
            NodeKind::Assignment { name, .. } => format!("assignment({name})"),
            NodeKind::Function(def) => format!("function({})", def.params.join(",")),
            NodeKind::Call { callee, .. } => format!("call({callee})"),
            NodeKind::Block(_) => "block".to_string(),
            NodeKind::List(_) => "list".to_string(),
            NodeKind::StatementList(_) => "statements".to_string(),
        };
        let children = self.children();
        if children.is_empty() {
            return head;
        }
        let inner: Vec<String> = children.iter().map(|c| c.shape()).collect();
        format!("{head}[{}]", inner.join(", "))
    }
}
