use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Attrs, Node};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
    #[error("duplicate {what}: {id}")]
    Duplicate { what: &'static str, id: String },
    #[error("invalid content expression for {kind}: {reason}")]
    InvalidContent { kind: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    #[serde(default)]
    pub is_void: bool,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Content expression, e.g. `"list_item+"` or `"paragraph block*"`.
    #[serde(default)]
    pub content: String,
    /// Structural edits never cross the boundary of an isolating node.
    #[serde(default)]
    pub isolating: bool,
    #[serde(default)]
    pub default_attrs: Attrs,
}

impl NodeSpec {
    pub fn block(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            role: NodeRole::Block,
            is_void: false,
            groups: vec!["block".to_string()],
            content: content.into(),
            isolating: false,
            default_attrs: Attrs::default(),
        }
    }

    pub fn inline(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            role: NodeRole::Inline,
            is_void: false,
            groups: vec!["inline".to_string()],
            content: String::new(),
            isolating: false,
            default_attrs: Attrs::default(),
        }
    }

    pub fn void(mut self) -> Self {
        self.is_void = true;
        self.content.clear();
        self
    }

    /// Replaces the spec's groups.
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn isolating(mut self) -> Self {
        self.isolating = true;
        self
    }

    pub fn default_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.default_attrs.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    name: String,
    min: usize,
    max: Option<usize>,
}

/// Parsed content expression: a sequence of kind or group names, each with an
/// optional `?`, `*` or `+` quantifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentExpr {
    terms: Vec<Term>,
}

impl ContentExpr {
    pub fn parse(src: &str) -> Result<Self, String> {
        let mut terms = Vec::new();
        for token in src.split_whitespace() {
            let (name, min, max) = match token.chars().last() {
                Some('*') => (&token[..token.len() - 1], 0, None),
                Some('+') => (&token[..token.len() - 1], 1, None),
                Some('?') => (&token[..token.len() - 1], 0, Some(1)),
                _ => (token, 1, Some(1)),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(format!("bad term `{token}`"));
            }
            terms.push(Term {
                name: name.to_string(),
                min,
                max,
            });
        }
        Ok(Self { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn term_names(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.name.as_str())
    }

    fn first_term(&self) -> Option<&str> {
        self.terms.first().map(|t| t.name.as_str())
    }

    /// `member(term, kind)` decides whether `kind` satisfies the named term.
    pub fn matches(&self, kinds: &[&str], member: &dyn Fn(&str, &str) -> bool) -> bool {
        self.match_from(0, kinds, 0, member)
    }

    fn match_from(
        &self,
        term_ix: usize,
        kinds: &[&str],
        pos: usize,
        member: &dyn Fn(&str, &str) -> bool,
    ) -> bool {
        let Some(term) = self.terms.get(term_ix) else {
            return pos == kinds.len();
        };

        let mut run = 0;
        while pos + run < kinds.len()
            && term.max.is_none_or(|max| run < max)
            && member(&term.name, kinds[pos + run])
        {
            run += 1;
        }
        if run < term.min {
            return false;
        }

        (term.min..=run)
            .rev()
            .any(|taken| self.match_from(term_ix + 1, kinds, pos + taken, member))
    }
}

#[derive(Debug)]
struct TypeInfo {
    spec: NodeSpec,
    content: ContentExpr,
    textblock: bool,
}

/// Resolved node type handle. Cheap to clone; equality is by kind name, which
/// is unique within a schema.
#[derive(Clone)]
pub struct NodeType(Arc<TypeInfo>);

impl NodeType {
    pub fn name(&self) -> &str {
        &self.0.spec.kind
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.0.spec
    }

    pub fn content(&self) -> &ContentExpr {
        &self.0.content
    }

    pub fn is_textblock(&self) -> bool {
        self.0.textblock
    }

    pub fn is_isolating(&self) -> bool {
        self.0.spec.isolating
    }

    pub fn default_attrs(&self) -> &Attrs {
        &self.0.spec.default_attrs
    }

    /// Default attributes overlaid with `attrs`.
    pub fn compute_attrs(&self, attrs: &Attrs) -> Attrs {
        let mut out = self.default_attrs().clone();
        out.extend(attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.name() == other.name()
    }
}

impl Eq for NodeType {}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeType").field(&self.name()).finish()
    }
}

/// A node type given either by name or by an already resolved handle.
#[derive(Debug, Clone)]
pub enum TypeRef<'a> {
    Name(&'a str),
    Handle(NodeType),
}

impl<'a> From<&'a str> for TypeRef<'a> {
    fn from(value: &'a str) -> Self {
        TypeRef::Name(value)
    }
}

impl<'a> From<&'a String> for TypeRef<'a> {
    fn from(value: &'a String) -> Self {
        TypeRef::Name(value.as_str())
    }
}

impl From<NodeType> for TypeRef<'_> {
    fn from(value: NodeType) -> Self {
        TypeRef::Handle(value)
    }
}

impl From<&NodeType> for TypeRef<'_> {
    fn from(value: &NodeType) -> Self {
        TypeRef::Handle(value.clone())
    }
}

#[derive(Debug, Default)]
pub struct Schema {
    types: HashMap<String, NodeType>,
    order: Vec<String>,
}

impl Schema {
    pub fn new(specs: impl IntoIterator<Item = NodeSpec>) -> Result<Self, SchemaError> {
        let specs: Vec<NodeSpec> = specs.into_iter().collect();

        let mut parsed: Vec<(NodeSpec, ContentExpr)> = Vec::with_capacity(specs.len());
        for spec in specs {
            if parsed.iter().any(|(s, _)| s.kind == spec.kind) {
                return Err(SchemaError::Duplicate {
                    what: "node spec kind",
                    id: spec.kind,
                });
            }
            let content =
                ContentExpr::parse(&spec.content).map_err(|reason| SchemaError::InvalidContent {
                    kind: spec.kind.clone(),
                    reason,
                })?;
            parsed.push((spec, content));
        }

        let members = |term: &str| {
            parsed
                .iter()
                .map(|(s, _)| s)
                .filter(|s| s.kind == term || s.groups.iter().any(|g| g == term))
                .collect::<Vec<_>>()
        };

        let mut infos: Vec<TypeInfo> = Vec::with_capacity(parsed.len());
        for (spec, content) in &parsed {
            let mut inline_only = !content.is_empty();
            for term in content.term_names() {
                let found = members(term);
                if found.is_empty() {
                    return Err(SchemaError::InvalidContent {
                        kind: spec.kind.clone(),
                        reason: format!("unknown term `{term}`"),
                    });
                }
                inline_only &= found.iter().all(|s| s.role == NodeRole::Inline);
            }
            infos.push(TypeInfo {
                spec: spec.clone(),
                content: content.clone(),
                textblock: spec.role == NodeRole::Block && !spec.is_void && inline_only,
            });
        }

        let mut schema = Schema::default();
        for info in infos {
            let kind = info.spec.kind.clone();
            schema.order.push(kind.clone());
            schema.types.insert(kind, NodeType(Arc::new(info)));
        }
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&NodeType> {
        self.types.get(name)
    }

    pub fn node_type(&self, name: &str) -> Result<NodeType, SchemaError> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownNodeType(name.to_string()))
    }

    /// Resolves a name or checks that a handle belongs to this schema.
    pub fn resolve<'a>(&self, ty: impl Into<TypeRef<'a>>) -> Result<NodeType, SchemaError> {
        match ty.into() {
            TypeRef::Name(name) => self.node_type(name),
            TypeRef::Handle(handle) => match self.types.get(handle.name()) {
                Some(own) if own == &handle => Ok(own.clone()),
                _ => Err(SchemaError::UnknownNodeType(handle.name().to_string())),
            },
        }
    }

    /// Node types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.order.iter().filter_map(|k| self.types.get(k))
    }

    pub fn in_group(&self, kind: &str, group: &str) -> bool {
        self.types
            .get(kind)
            .is_some_and(|t| t.spec().groups.iter().any(|g| g == group))
    }

    pub fn is_textblock(&self, kind: &str) -> bool {
        self.types.get(kind).is_some_and(NodeType::is_textblock)
    }

    pub fn is_isolating(&self, kind: &str) -> bool {
        self.types.get(kind).is_some_and(NodeType::is_isolating)
    }

    fn satisfies(&self, term: &str, kind: &str) -> bool {
        term == kind || self.in_group(kind, term)
    }

    /// Content-validity predicate of `kind` over a sequence of child kinds.
    pub fn accepts_kinds(&self, kind: &str, kinds: &[&str]) -> bool {
        let Some(ty) = self.types.get(kind) else {
            return false;
        };
        ty.content()
            .matches(kinds, &|term, child| self.satisfies(term, child))
    }

    pub fn accepts(&self, kind: &str, children: &[Node]) -> bool {
        let kinds: Vec<&str> = children.iter().map(Node::kind).collect();
        self.accepts_kinds(kind, &kinds)
    }

    pub fn valid_content(&self, ty: &NodeType, children: &[Node]) -> bool {
        self.accepts(ty.name(), children)
    }

    /// Whether `kind` would still be valid with `children[range]` replaced by
    /// `with`.
    pub fn can_replace(&self, kind: &str, children: &[Node], range: Range<usize>, with: &[Node]) -> bool {
        if range.start > range.end || range.end > children.len() {
            return false;
        }
        let kinds: Vec<&str> = children[..range.start]
            .iter()
            .chain(with)
            .chain(&children[range.end..])
            .map(Node::kind)
            .collect();
        self.accepts_kinds(kind, &kinds)
    }

    /// First concrete type able to fill the leading term of `ty`'s content.
    pub fn default_child(&self, ty: &NodeType) -> Option<NodeType> {
        let term = ty.content().first_term()?;
        if let Some(exact) = self.types.get(term) {
            return Some(exact.clone());
        }
        self.types()
            .find(|t| !t.spec().is_void && self.in_group(t.name(), term))
            .cloned()
    }

    /// First registered text block type, used when block formatting is
    /// cleared.
    pub fn default_textblock(&self) -> Option<&NodeType> {
        self.types().find(|t| t.is_textblock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DOC_KIND;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Schema::new(vec![
            NodeSpec::block(DOC_KIND, "block+").groups(Vec::<String>::new()),
            NodeSpec::inline("text"),
            NodeSpec::block("paragraph", "inline*"),
            NodeSpec::block("bullet_list", "list_item+").groups(["block", "list"]),
            NodeSpec::block("list_item", "paragraph block*").groups(Vec::<String>::new()),
        ])
        .unwrap()
    }

    #[test]
    fn parses_quantifiers() {
        let expr = ContentExpr::parse("paragraph block* heading? item+").unwrap();
        assert_eq!(expr.terms.len(), 4);
        assert_eq!(expr.terms[0].min, 1);
        assert_eq!(expr.terms[0].max, Some(1));
        assert_eq!(expr.terms[1].max, None);
        assert_eq!(expr.terms[2].min, 0);
        assert_eq!(expr.terms[3].min, 1);
        assert!(ContentExpr::parse("").unwrap().is_empty());
        assert!(ContentExpr::parse("a** b").is_err());
    }

    #[test]
    fn list_item_requires_leading_paragraph() {
        let schema = schema();
        assert!(schema.accepts_kinds("list_item", &["paragraph"]));
        assert!(schema.accepts_kinds("list_item", &["paragraph", "bullet_list", "paragraph"]));
        assert!(!schema.accepts_kinds("list_item", &["bullet_list"]));
        assert!(!schema.accepts_kinds("list_item", &[]));
    }

    #[test]
    fn backtracks_over_greedy_group_terms() {
        let schema = Schema::new(vec![
            NodeSpec::block(DOC_KIND, "block* paragraph").groups(Vec::<String>::new()),
            NodeSpec::inline("text"),
            NodeSpec::block("paragraph", "inline*"),
        ])
        .unwrap();
        assert!(schema.accepts_kinds(DOC_KIND, &["paragraph", "paragraph"]));
        assert!(!schema.accepts_kinds(DOC_KIND, &[]));
    }

    #[test]
    fn textblocks_are_detected_from_content() {
        let schema = schema();
        assert!(schema.is_textblock("paragraph"));
        assert!(!schema.is_textblock("list_item"));
        assert!(!schema.is_textblock(DOC_KIND));
        assert_eq!(schema.default_textblock().map(NodeType::name), Some("paragraph"));
    }

    #[test]
    fn rejects_unknown_terms_and_duplicates() {
        let err = Schema::new(vec![NodeSpec::block("a", "nope+")]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidContent { .. }));

        let err = Schema::new(vec![NodeSpec::inline("text"), NodeSpec::inline("text")]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::Duplicate {
                what: "node spec kind",
                id: "text".to_string()
            }
        );
    }

    #[test]
    fn resolves_names_and_handles() {
        let schema = schema();
        let list = schema.node_type("bullet_list").unwrap();
        assert_eq!(schema.resolve(&list).unwrap(), list);
        assert_eq!(schema.resolve("bullet_list").unwrap(), list);
        assert_eq!(
            schema.resolve("ordered_list").unwrap_err(),
            SchemaError::UnknownNodeType("ordered_list".to_string())
        );
        assert_eq!(schema.default_child(&list).map(|t| t.name().to_string()), Some("list_item".to_string()));
    }
}
