use regex::RegexBuilder;

use crate::graph::{Symbol, WorkspaceGraph};

use super::is_definition;

impl WorkspaceGraph {
    /// Find definitions whose name or qualified name matches the regex `pattern`.
    ///
    /// Results are ordered by file, then position.
    ///
    /// # Errors
    /// Returns the regex error if `pattern` does not compile.
    pub fn find_symbols(&self, pattern: &str) -> Result<Vec<Symbol>, regex::Error> {
        self.find_symbols_with(pattern, false)
    }

    /// [`Self::find_symbols`] with optional case-insensitive matching.
    pub fn find_symbols_with(&self, pattern: &str, case_insensitive: bool) -> Result<Vec<Symbol>, regex::Error> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;

        let mut out = Vec::new();
        for entry in self.files.values() {
            for &node in &entry.symbols {
                let Some(info) = self.symbol_info(node) else {
                    continue;
                };
                if !is_definition(info.kind) {
                    continue;
                }
                if (re.is_match(&info.name) || re.is_match(&info.qualified_name))
                    && let Some(symbol) = self.to_symbol(node)
                {
                    out.push(symbol);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::query::tests::graph_of;

    #[test]
    fn test_find_symbols_by_regex() {
        let graph = graph_of(&[
            ("/w/a.py", "def load_user():\n    pass\n\ndef save_user():\n    pass\n"),
            ("/w/b.py", "from a import load_user\n\nclass UserStore:\n    def load(self):\n        pass\n"),
        ]);
        let found: Vec<String> = graph
            .find_symbols("^load")
            .unwrap()
            .into_iter()
            .map(|s| s.qualified_name)
            .collect();
        assert_eq!(found, vec!["load_user".to_owned(), "UserStore.load".to_owned()]);

        assert_eq!(graph.find_symbols_with("userstore", true).unwrap().len(), 2, "class and its method");
        assert!(graph.find_symbols("(").is_err());
    }
}
