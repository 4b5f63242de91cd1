use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{Attrs, DOC_KIND, Document, Editor, EditorConfig, MarkKind, Marks, Selection};
use crate::resolve::find_parent_node;
use crate::schema::{NodeSpec, Schema, SchemaError};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<SchemaError> for CommandError {
    fn from(err: SchemaError) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<SchemaError> for QueryError {
    fn from(err: SchemaError) -> Self {
        Self::new(err.to_string())
    }
}

pub type CommandHandler =
    Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;

pub type QueryHandler = Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub hidden: bool,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            hidden: false,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

/// Classifies nodes and marks for the list commands.
pub trait ListCapabilities: Send + Sync {
    fn is_list_kind(&self, kind: &str) -> bool;

    /// Marks that should survive a structural change at `selection`.
    fn active_splittable_marks(
        &self,
        doc: &Document,
        selection: &Selection,
        stored: Option<&Marks>,
    ) -> Marks;
}

/// Default capabilities: list kinds are the members of the configured spec
/// group, and marks listed as unsplittable in the config are never carried.
#[derive(Debug, Clone)]
pub struct SchemaCapabilities {
    list_kinds: BTreeSet<String>,
    unsplittable: Vec<MarkKind>,
}

impl SchemaCapabilities {
    pub fn new(schema: &Schema, config: &EditorConfig) -> Self {
        let list_kinds = schema
            .types()
            .filter(|ty| schema.in_group(ty.name(), &config.list_group))
            .map(|ty| ty.name().to_string())
            .collect();
        Self {
            list_kinds,
            unsplittable: config.unsplittable_marks().to_vec(),
        }
    }
}

impl ListCapabilities for SchemaCapabilities {
    fn is_list_kind(&self, kind: &str) -> bool {
        self.list_kinds.contains(kind)
    }

    fn active_splittable_marks(
        &self,
        doc: &Document,
        selection: &Selection,
        stored: Option<&Marks>,
    ) -> Marks {
        let marks = match stored {
            Some(stored) => stored.clone(),
            None => {
                let at_block_start = doc
                    .resolve(selection.to())
                    .is_none_or(|to| to.parent_offset() == 0);
                if at_block_start {
                    Marks::default()
                } else {
                    doc.resolve(selection.from())
                        .map(|from| from.marks())
                        .unwrap_or_default()
                }
            }
        };
        marks.without(&self.unsplittable)
    }
}

pub struct PluginRegistry {
    schema: Arc<Schema>,
    plugin_ids: Vec<&'static str>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>) -> Result<Self, SchemaError> {
        let mut specs: Vec<NodeSpec> = Vec::new();
        let mut plugin_ids: Vec<&'static str> = Vec::new();
        let mut commands: HashMap<String, CommandSpec> = HashMap::new();
        let mut queries: HashMap<String, QuerySpec> = HashMap::new();

        for plugin in plugins {
            if plugin_ids.contains(&plugin.id()) {
                return Err(SchemaError::Duplicate {
                    what: "plugin id",
                    id: plugin.id().to_string(),
                });
            }
            plugin_ids.push(plugin.id());
            specs.extend(plugin.node_specs());

            for cmd in plugin.commands() {
                if commands.contains_key(&cmd.id) {
                    return Err(SchemaError::Duplicate {
                        what: "command id",
                        id: cmd.id,
                    });
                }
                commands.insert(cmd.id.clone(), cmd);
            }

            for query in plugin.queries() {
                if queries.contains_key(&query.id) {
                    return Err(SchemaError::Duplicate {
                        what: "query id",
                        id: query.id,
                    });
                }
                queries.insert(query.id.clone(), query);
            }
        }

        let schema = Schema::new(specs)?;
        tracing::debug!(
            plugins = plugin_ids.len(),
            node_types = schema.types().count(),
            commands = commands.len(),
            "plugin registry built"
        );
        Ok(Self {
            schema: Arc::new(schema),
            plugin_ids,
            commands,
            queries,
        })
    }

    /// Document, paragraph and the bullet/ordered list plugins.
    pub fn core() -> Self {
        let plugins: Vec<Box<dyn PlatePlugin>> =
            vec![Box::new(CoreDocumentPlugin), Box::new(ListPlugin)];
        Self::new(plugins).expect("core registry must be valid")
    }

    pub fn richtext() -> Self {
        let plugins: Vec<Box<dyn PlatePlugin>> = vec![
            Box::new(CoreDocumentPlugin),
            Box::new(HeadingPlugin),
            Box::new(BlockquotePlugin),
            Box::new(ListPlugin),
            Box::new(TaskListPlugin),
            Box::new(TablePlugin),
        ];
        Self::new(plugins).expect("richtext registry must be valid")
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn schema_arc(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn plugin_ids(&self) -> &[&'static str] {
        &self.plugin_ids
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.schema.get(kind).is_some()
    }
}

fn parse_args<T: DeserializeOwned>(args: Option<Value>) -> Result<T, CommandError> {
    let args = args.ok_or_else(|| CommandError::new("Missing args"))?;
    serde_json::from_value(args).map_err(|err| CommandError::new(format!("Invalid args: {err}")))
}

fn parse_query_args<T: DeserializeOwned>(args: Option<Value>) -> Result<T, QueryError> {
    let args = args.ok_or_else(|| QueryError::new("Missing args"))?;
    serde_json::from_value(args).map_err(|err| QueryError::new(format!("Invalid args: {err}")))
}

fn ensure_applied(applied: bool, what: &str) -> Result<(), CommandError> {
    if applied {
        Ok(())
    } else {
        Err(CommandError::new(format!("Cannot {what} here")))
    }
}

struct CoreDocumentPlugin;

impl PlatePlugin for CoreDocumentPlugin {
    fn id(&self) -> &'static str {
        "core.document"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block(DOC_KIND, "block+").groups(Vec::<String>::new()),
            NodeSpec::inline("text"),
            NodeSpec::block("paragraph", "inline*"),
            NodeSpec::inline("hard_break").void(),
            NodeSpec::block("horizontal_rule", "").void(),
        ]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.clear_formatting", "Clear block formatting", |editor, _args| {
                ensure_applied(editor.clear_nodes(), "clear block formatting")
            })
            .description("Turn the selected blocks into plain paragraphs at the top level.")
            .keywords(["clear", "paragraph", "reset", "plain"]),
            CommandSpec::new("text.insert", "Insert text", |editor, args| {
                #[derive(Deserialize)]
                struct InsertArgs {
                    text: String,
                }
                let InsertArgs { text } = parse_args(args)?;
                editor
                    .insert_text(&text)
                    .map_err(|e| CommandError::new(format!("Failed to insert text: {e}")))
            })
            .args_example(serde_json::json!({ "text": "hello" }))
            .hidden(true),
        ]
    }
}

struct HeadingPlugin;

impl PlatePlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block("heading", "inline*").default_attr("level", Value::from(1))]
    }
}

struct BlockquotePlugin;

impl PlatePlugin for BlockquotePlugin {
    fn id(&self) -> &'static str {
        "blockquote"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block("blockquote", "block+")]
    }
}

#[derive(Debug, Deserialize)]
struct ToggleArgs {
    list: String,
    #[serde(default)]
    item: Option<String>,
    #[serde(default)]
    keep_marks: bool,
    #[serde(default)]
    attrs: Attrs,
}

impl ToggleArgs {
    /// Item type named in the args, else the list's default item type.
    fn item(&self, schema: &Schema) -> Result<String, SchemaError> {
        if let Some(item) = &self.item {
            return Ok(item.clone());
        }
        let list = schema.node_type(&self.list)?;
        schema
            .default_child(&list)
            .map(|ty| ty.name().to_string())
            .ok_or_else(|| SchemaError::UnknownNodeType(format!("item of {}", self.list)))
    }
}

fn toggle_named_list(
    editor: &mut Editor,
    list: &str,
    item: &str,
    keep_marks: bool,
    attrs: Attrs,
) -> Result<(), CommandError> {
    let applied = editor.toggle_list(list, item, keep_marks, attrs)?;
    ensure_applied(applied, &format!("toggle {list}"))
}

/// Nearest enclosing list kind at the selection start.
fn active_list_type(editor: &Editor) -> Option<String> {
    let from = editor.doc().resolve(editor.selection().from())?;
    let capabilities = editor.capabilities();
    find_parent_node(&from, |el| capabilities.is_list_kind(&el.kind)).map(|m| m.node.kind.clone())
}

struct ListPlugin;

impl PlatePlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block("bullet_list", "list_item+").groups(["block", "list"]),
            NodeSpec::block("ordered_list", "list_item+")
                .groups(["block", "list"])
                .default_attr("start", Value::from(1)),
            NodeSpec::block("list_item", "paragraph block*").groups(Vec::<String>::new()),
        ]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("list.toggle_bullet", "Toggle bullet list", |editor, _args| {
                toggle_named_list(editor, "bullet_list", "list_item", false, Attrs::default())
            })
            .description("Toggle a bullet list for the selected block(s).")
            .keywords(["list", "bullet", "unordered", "ul"]),
            CommandSpec::new("list.toggle_ordered", "Toggle ordered list", |editor, _args| {
                toggle_named_list(editor, "ordered_list", "list_item", false, Attrs::default())
            })
            .description("Toggle an ordered list for the selected block(s).")
            .keywords(["list", "ordered", "numbered", "ol"]),
            CommandSpec::new("list.toggle", "Toggle list", |editor, args| {
                let args: ToggleArgs = parse_args(args)?;
                let item = args.item(editor.schema())?;
                toggle_named_list(editor, &args.list, &item, args.keep_marks, args.attrs)
            })
            .description("Toggle any list type, converting or joining neighbouring lists.")
            .keywords(["list", "toggle"])
            .args_example(serde_json::json!({
                "list": "ordered_list",
                "item": "list_item",
                "keep_marks": true,
                "attrs": { "start": 3 }
            })),
            CommandSpec::new("list.lift", "Lift list item", |editor, args| {
                #[derive(Deserialize, Default)]
                struct LiftArgs {
                    #[serde(default)]
                    item: Option<String>,
                }
                let LiftArgs { item } = match args {
                    Some(args) => parse_args(Some(args))?,
                    None => LiftArgs::default(),
                };
                let item = item.as_deref().unwrap_or("list_item");
                let applied = editor.lift_list_item(item)?;
                ensure_applied(applied, "lift list item")
            })
            .description("Move the selected list items one level out.")
            .keywords(["list", "outdent", "lift", "unwrap"]),
            CommandSpec::new("list.wrap", "Wrap in list", |editor, args| {
                #[derive(Deserialize)]
                struct WrapArgs {
                    list: String,
                    #[serde(default)]
                    attrs: Attrs,
                }
                let WrapArgs { list, attrs } = parse_args(args)?;
                let applied = editor.wrap_in_list(list.as_str(), attrs)?;
                ensure_applied(applied, &format!("wrap in {list}"))
            })
            .description("Wrap the selected blocks in a new list.")
            .keywords(["list", "wrap"])
            .args_example(serde_json::json!({ "list": "bullet_list" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec {
                id: "list.active_type".to_string(),
                handler: Arc::new(|editor, _args| {
                    Ok(active_list_type(editor)
                        .map(Value::String)
                        .unwrap_or(Value::Null))
                }),
            },
            QuerySpec {
                id: "list.is_active".to_string(),
                handler: Arc::new(|editor, args| {
                    let expected = args
                        .as_ref()
                        .and_then(|v| v.get("type"))
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| QueryError::new("Missing args.type"))?;
                    Ok(Value::Bool(
                        active_list_type(editor).as_deref() == Some(expected),
                    ))
                }),
            },
            QuerySpec {
                id: "list.can_toggle".to_string(),
                handler: Arc::new(|editor, args| {
                    let args: ToggleArgs = parse_query_args(args)?;
                    let item = args.item(editor.schema())?;
                    let can = editor.can_toggle_list(args.list.as_str(), item.as_str())?;
                    Ok(Value::Bool(can))
                }),
            },
        ]
    }
}

struct TaskListPlugin;

impl PlatePlugin for TaskListPlugin {
    fn id(&self) -> &'static str {
        "task_list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block("task_list", "task_item+").groups(["block", "list"]),
            NodeSpec::block("task_item", "paragraph block*")
                .groups(Vec::<String>::new())
                .default_attr("checked", Value::Bool(false)),
        ]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("list.toggle_task", "Toggle task list", |editor, _args| {
                toggle_named_list(editor, "task_list", "task_item", false, Attrs::default())
            })
            .description("Toggle a task list for the selected block(s).")
            .keywords(["list", "task", "todo", "checklist"]),
        ]
    }
}

struct TablePlugin;

impl PlatePlugin for TablePlugin {
    fn id(&self) -> &'static str {
        "table"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block("table", "table_row+"),
            NodeSpec::block("table_row", "table_cell+").groups(Vec::<String>::new()),
            NodeSpec::block("table_cell", "block+")
                .groups(Vec::<String>::new())
                .isolating(),
        ]
    }
}
