//! A plain registry of tools by name.
//!
//! Grounded in `btflow/tools/registry.py`'s `ToolRegistry` — the original keeps a
//! small independent type distinct from the ReAct-loop-specific executor;
//! REDESIGN FLAGS calls for replacing ambient/global registries with explicit
//! objects the caller owns, so this is a plain struct rather than a module-level
//! singleton.

use std::collections::HashMap;
use std::sync::Arc;

use btflow_core::Tool;

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btflow_core::{ToolRun, ToolSchema};

    struct EchoTool;
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn input_schema(&self) -> &ToolSchema {
            static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(ToolSchema::string)
        }
        fn output_schema(&self) -> &ToolSchema {
            self.input_schema()
        }
        fn run(&self) -> ToolRun {
            ToolRun::Sync(Arc::new(|value| Ok(value)))
        }
    }

    #[test]
    fn register_get_list_remove_round_trip() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert_eq!(registry.list().len(), 1);
        assert!(registry.remove("echo").is_some());
        assert!(registry.get("echo").is_none());
    }
}
