use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::list::ToggleList;
use crate::ops::Transaction;
use crate::plan::{ExecMode, Plan, Step};
use crate::plugin::{
    CommandError, ListCapabilities, PluginRegistry, QueryError, SchemaCapabilities,
};
use crate::schema::{Schema, SchemaError, TypeRef};

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

/// Kind reported for the document root when it is viewed as a container.
pub const DOC_KIND: &str = "doc";
/// Kind reported for text nodes.
pub const TEXT_KIND: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn content_size(&self) -> usize {
        self.children.iter().map(Node::size).sum()
    }

    /// The node that starts exactly at `pos`, if any.
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let resolved = self.resolve(pos)?;
        if resolved.text_offset() != 0 {
            return None;
        }
        resolved.node_after()
    }

    /// Child-index path of the node that starts exactly at `pos`.
    pub fn path_at(&self, pos: usize) -> Option<Vec<usize>> {
        let resolved = self.resolve(pos)?;
        if resolved.text_offset() != 0 || resolved.node_after().is_none() {
            return None;
        }
        let depth = resolved.depth();
        let mut path = resolved.path_to(depth);
        path.push(resolved.index(depth));
        Some(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn element(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs: Attrs::default(),
            children,
        })
    }

    pub fn element_with_attrs(kind: impl Into<String>, attrs: Attrs, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs,
            children,
        })
    }

    /// Paragraph holding `text`. An empty string yields an empty paragraph; the
    /// model never stores empty text nodes.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element("paragraph", text_children(text.into()))
    }

    pub fn heading(level: u64, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("level".to_string(), Value::from(level));
        Node::element_with_attrs("heading", attrs, text_children(text.into()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn marked_text(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn divider() -> Self {
        Node::Void(VoidNode {
            kind: "horizontal_rule".to_string(),
            attrs: Attrs::default(),
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            Node::Element(el) => &el.kind,
            Node::Text(_) => TEXT_KIND,
            Node::Void(v) => &v.kind,
        }
    }

    /// Width of the node in the flattened position space.
    pub fn size(&self) -> usize {
        match self {
            Node::Element(el) => el.size(),
            Node::Text(t) => t.len(),
            Node::Void(_) => 1,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            Node::Text(_) | Node::Void(_) => &[],
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Concatenated text of the subtree, blocks not separated.
    pub fn text_content(&self) -> String {
        match self {
            Node::Text(t) => t.text.clone(),
            Node::Void(_) => String::new(),
            Node::Element(el) => el.children.iter().map(Node::text_content).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn content_size(&self) -> usize {
        self.children.iter().map(Node::size).sum()
    }

    pub fn size(&self) -> usize {
        self.content_size() + 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl TextNode {
    /// Length in positions (chars, not bytes).
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    TextColor,
    HighlightColor,
    Link,
}

impl Marks {
    pub fn is_empty(&self) -> bool {
        self == &Marks::default()
    }

    pub fn has(&self, kind: MarkKind) -> bool {
        match kind {
            MarkKind::Bold => self.bold,
            MarkKind::Italic => self.italic,
            MarkKind::Underline => self.underline,
            MarkKind::Strikethrough => self.strikethrough,
            MarkKind::Code => self.code,
            MarkKind::TextColor => self.text_color.is_some(),
            MarkKind::HighlightColor => self.highlight_color.is_some(),
            MarkKind::Link => self.link.is_some(),
        }
    }

    pub fn clear(&mut self, kind: MarkKind) {
        match kind {
            MarkKind::Bold => self.bold = false,
            MarkKind::Italic => self.italic = false,
            MarkKind::Underline => self.underline = false,
            MarkKind::Strikethrough => self.strikethrough = false,
            MarkKind::Code => self.code = false,
            MarkKind::TextColor => self.text_color = None,
            MarkKind::HighlightColor => self.highlight_color = None,
            MarkKind::Link => self.link = None,
        }
    }

    pub fn without(mut self, kinds: &[MarkKind]) -> Self {
        for kind in kinds {
            self.clear(*kind);
        }
        self
    }
}

/// Selection over absolute positions. `anchor` stays put while `head` moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn collapsed(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EditorConfig {
    /// Node spec group whose members count as list kinds.
    pub list_group: String,
    /// Text block kind that block clearing converts to.
    pub default_block: String,
    /// Marks dropped when carrying marks across a structural split.
    pub unsplittable_marks: Option<Vec<MarkKind>>,
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.list_group.is_empty() {
            self.list_group = "list".to_string();
        }
        if self.default_block.is_empty() {
            self.default_block = "paragraph".to_string();
        }
        if self.unsplittable_marks.is_none() {
            self.unsplittable_marks = Some(vec![MarkKind::Link]);
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(s)?;
        Ok(config.with_defaults())
    }

    pub fn unsplittable_marks(&self) -> &[MarkKind] {
        self.unsplittable_marks.as_deref().unwrap_or(&[])
    }
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    stored_marks: Option<Marks>,
    registry: PluginRegistry,
    config: EditorConfig,
    capabilities: Arc<dyn ListCapabilities>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let config = config.with_defaults();
        let capabilities = Arc::new(SchemaCapabilities::new(registry.schema(), &config));
        let selection = clamp_selection(&doc, selection);
        Self {
            doc,
            selection,
            stored_marks: None,
            registry,
            config,
            capabilities,
        }
    }

    pub fn with_core_plugins() -> Self {
        let doc = Document::new(vec![Node::paragraph("")]);
        Self::new(doc, Selection::collapsed(1), PluginRegistry::core())
    }

    pub fn with_richtext_plugins() -> Self {
        let doc = Document::new(vec![Node::paragraph("")]);
        Self::new(doc, Selection::collapsed(1), PluginRegistry::richtext())
    }

    /// Replaces the list/mark classification, e.g. with a host-provided one.
    pub fn with_capabilities(mut self, capabilities: Arc<dyn ListCapabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = clamp_selection(&self.doc, selection);
    }

    pub fn stored_marks(&self) -> Option<&Marks> {
        self.stored_marks.as_ref()
    }

    pub fn set_stored_marks(&mut self, marks: Option<Marks>) {
        self.stored_marks = marks;
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn schema(&self) -> &Schema {
        self.registry.schema()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &dyn ListCapabilities {
        self.capabilities.as_ref()
    }

    /// Fresh pending transaction drafted from the current state.
    pub fn transaction(&self) -> Transaction {
        Transaction::new(
            self.doc.clone(),
            self.selection,
            self.stored_marks.clone(),
            self.registry.schema_arc(),
            &self.config,
        )
    }

    /// Commits a finished transaction. The swap is the only point at which the
    /// editor state changes.
    pub fn apply(&mut self, tx: Transaction) {
        tracing::debug!(
            source = tx.meta().source.as_deref().unwrap_or("unknown"),
            ops = tx.ops().len(),
            "applying transaction"
        );
        let (doc, selection, stored_marks) = tx.into_parts();
        self.doc = doc;
        self.selection = selection;
        self.stored_marks = stored_marks;
    }

    /// Feasibility pass: runs `plan` against a throwaway draft.
    pub fn can(&self, plan: &Plan) -> bool {
        let mut tx = self.transaction();
        plan.run(&mut tx, ExecMode::Feasibility)
    }

    /// Commit pass: runs `plan` and applies the draft only if every mandatory
    /// step succeeded.
    pub fn commit(&mut self, plan: &Plan) -> bool {
        let mut tx = self.transaction().source(plan.source());
        if !plan.run(&mut tx, ExecMode::Commit) {
            return false;
        }
        self.apply(tx);
        true
    }

    pub fn toggle_list<'a>(
        &mut self,
        list: impl Into<TypeRef<'a>>,
        item: impl Into<TypeRef<'a>>,
        keep_marks: bool,
        attrs: Attrs,
    ) -> Result<bool, SchemaError> {
        let toggle = ToggleList::resolve(self.schema(), list, item)?
            .keep_marks(keep_marks)
            .attrs(attrs);
        Ok(toggle.run(self))
    }

    pub fn can_toggle_list<'a>(
        &self,
        list: impl Into<TypeRef<'a>>,
        item: impl Into<TypeRef<'a>>,
    ) -> Result<bool, SchemaError> {
        let toggle = ToggleList::resolve(self.schema(), list, item)?;
        Ok(toggle.can_run(self))
    }

    pub fn wrap_in_list<'a>(
        &mut self,
        list: impl Into<TypeRef<'a>>,
        attrs: Attrs,
    ) -> Result<bool, SchemaError> {
        let list = self.schema().resolve(list)?;
        Ok(self.commit(&Plan::from(Step::WrapInList { list, attrs })))
    }

    pub fn lift_list_item<'a>(&mut self, item: impl Into<TypeRef<'a>>) -> Result<bool, SchemaError> {
        let item = self.schema().resolve(item)?;
        Ok(self.commit(&Plan::from(Step::LiftListItem { item })))
    }

    pub fn clear_nodes(&mut self) -> bool {
        self.commit(&Plan::from(Step::ClearNodes))
    }

    /// Types `text` at the selection head using the stored marks, falling back
    /// to the marks at the cursor.
    pub fn insert_text(&mut self, text: &str) -> Result<(), crate::ops::ApplyError> {
        let mut tx = self.transaction().source("input:text");
        tx.insert_text(text)?;
        self.apply(tx);
        Ok(())
    }

    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }
}

fn text_children(text: String) -> Vec<Node> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(text)]
    }
}

fn clamp_selection(doc: &Document, selection: Selection) -> Selection {
    let size = doc.content_size();
    Selection {
        anchor: selection.anchor.min(size),
        head: selection.head.min(size),
    }
}
