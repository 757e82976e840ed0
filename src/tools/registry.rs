//! Tool registry.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::tool::Tool;
use crate::types::ToolDeclaration;

/// Client-level tools, keyed by name.
///
/// Lookups take a read lock and may run concurrently. Register tools before
/// starting requests; registering while calls are in flight is allowed but
/// in-flight calls keep the snapshot they started with.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(&self, tool: impl Tool + 'static) -> Option<Arc<dyn Tool>> {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name().to_string();
        self.write().insert(name, tool)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registry tools followed by request-scoped tools.
    pub fn merged_with(&self, request_tools: &[Arc<dyn Tool>]) -> ToolSet {
        let mut tools: Vec<Arc<dyn Tool>> = self.read().values().cloned().collect();
        tools.extend(request_tools.iter().cloned());
        ToolSet { tools }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Arc<dyn Tool>>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Arc<dyn Tool>>> {
        self.tools.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// The tools visible to one request.
///
/// Request-scoped tools are appended after registry tools rather than merged
/// into the map. When names collide, the entry appended last wins.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("ToolSet").field("tools", &names).finish()
    }
}

impl ToolSet {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().rev().find(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One declaration per distinct name, using the entry [`find`](Self::find) would pick.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut out: Vec<ToolDeclaration> = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            let decl = tool.declaration();
            match out.iter_mut().find(|d| d.name() == decl.name()) {
                Some(existing) => *existing = decl,
                None => out.push(decl),
            }
        }
        out
    }
}
