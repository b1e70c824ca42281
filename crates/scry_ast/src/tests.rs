// ==============================================================================
// Test Fixtures
// ==============================================================================
//
// A `SourceDb` over pre-registered modules. Downstream crates use it the same
// way an editor host would use a real parser-backed database, minus the
// parsing: tests lower fixtures through `ModuleBuilder` and register them
// under the paths the resolver will probe.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{FileId, Module, SourceDb};

#[derive(Debug, Default)]
pub struct TestDatabase {
    modules: Vec<Arc<Module>>,
    by_path: HashMap<PathBuf, FileId>,
}

impl TestDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, indexing it by its path when it has one.
    pub fn add_module(&mut self, module: Module) -> FileId {
        let file = FileId::from(self.modules.len() as u32);
        if let Some(path) = &module.path {
            self.by_path.insert(path.clone(), file);
        }
        self.modules.push(Arc::new(module));
        file
    }

    pub fn single_module(module: Module) -> (Self, FileId) {
        let mut db = Self::new();
        let file = db.add_module(module);
        (db, file)
    }
}

impl SourceDb for TestDatabase {
    fn module(&self, file: FileId) -> Arc<Module> {
        self.modules[usize::from(file)].clone()
    }

    fn load_file(&self, path: &Path) -> Option<FileId> {
        self.by_path.get(path).copied()
    }
}
