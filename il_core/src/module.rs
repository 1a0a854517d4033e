//! The top-level IL container: a version string plus ordered externs,
//! globals and functions. All names are unique within their namespace;
//! iteration always follows insertion order (§5 determinism).

use crate::externs::Extern;
use crate::function::Function;
use crate::global::Global;

#[derive(Debug, Clone)]
pub struct Module {
    pub version: String,
    pub externs: Vec<Extern>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            externs: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn find_extern(&self, name: &str) -> Option<&Extern> {
        self.externs.iter().find(|e| e.name == name)
    }

    pub fn find_global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn find_function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn add_extern(&mut self, ext: Extern) {
        self.externs.push(ext);
    }

    pub fn add_global(&mut self, global: Global) {
        self.globals.push(global);
    }

    pub fn add_function(&mut self, func: Function) {
        self.functions.push(func);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn lookups_use_first_match_in_insertion_order() {
        let mut m = Module::new("0.1.2");
        m.add_function(Function::new("main", Type::I64));
        assert!(m.find_function("main").is_some());
        assert!(m.find_function("missing").is_none());
    }
}
