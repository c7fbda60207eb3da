use super::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Root,
    CommandCall,
    ControlCall,
    Block,
    StringLiteral,
    ArgumentList,
    VariableReference,
    SubstitutionCall,
    VectorExpansion,
    /// Several adjacent argument pieces glued into one argument.
    Concatenation,
}

/// A syntax tree node. Children are owned exclusively; the origin token is
/// kept for diagnostics only.
///
/// Shapes produced by the parser:
///
/// - `Root`, `Block`: statements
/// - `CommandCall`: `[name, ArgumentList]`
/// - `ControlCall`: `[name, ArgumentList, body]`
/// - `SubstitutionCall`: `[name, ArgumentList]`
/// - `VariableReference`: `[name]`
/// - `VectorExpansion`: `[VariableReference | SubstitutionCall]`
/// - `Concatenation`: pieces
/// - `StringLiteral`: no children, value in the token lexeme
#[derive(Clone, PartialEq, Eq)]
pub struct Node {
    typ: NodeType,
    children: Vec<Node>,
    token: Option<Token>,
}

impl Node {
    pub(crate) fn new(typ: NodeType, token: Option<Token>, children: Vec<Node>) -> Self {
        Self {
            typ,
            children,
            token,
        }
    }

    pub(crate) fn literal(token: Token) -> Self {
        Self::new(NodeType::StringLiteral, Some(token), vec![])
    }

    pub fn typ(&self) -> NodeType {
        self.typ
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// The literal value of a `StringLiteral` node.
    pub fn str_content(&self) -> Option<&str> {
        match self.typ {
            NodeType::StringLiteral => self.token.as_ref().map(|t| t.lexeme.as_str()),
            _ => None,
        }
    }

    /// Collects every node in this subtree, this one included, for which
    /// `predicate` holds. Pre-order.
    pub fn find_all<F>(&self, predicate: F) -> Vec<&Node>
    where
        F: Fn(&Node) -> bool,
    {
        let mut found = vec![];
        self.collect(&predicate, &mut found);
        found
    }

    fn collect<'a, F>(&'a self, predicate: &F, found: &mut Vec<&'a Node>)
    where
        F: Fn(&Node) -> bool,
    {
        if predicate(self) {
            found.push(self);
        }
        for child in &self.children {
            child.collect(predicate, found);
        }
    }

    /// Indented rendering of the tree, one node per line.
    pub fn prettify(&self) -> String {
        let mut out = String::new();
        self.write_pretty(0, &mut out);
        out
    }

    fn write_pretty(&self, depth: usize, out: &mut String) {
        out.push_str(&"    ".repeat(depth));
        match self.str_content() {
            Some(content) => out.push_str(&format!("{:?} {:?}\n", self.typ, content)),
            None => out.push_str(&format!("{:?}\n", self.typ)),
        }
        for child in &self.children {
            child.write_pretty(depth + 1, out);
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.str_content() {
            Some(content) => write!(f, "StringLiteral({content:?})"),
            None => write!(f, "{:?}({:?})", self.typ, self.children),
        }
    }
}

/// A parsed script together with its source text.
#[derive(Debug, Clone)]
pub struct Ast {
    pub(crate) root: Node,
    pub(crate) script: String,
}

impl Ast {
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn prettify(&self) -> String {
        self.root.prettify()
    }
}
