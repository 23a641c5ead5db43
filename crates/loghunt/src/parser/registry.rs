use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use super::command::{normalize_command, CommandMatcher};
use super::formats;
use super::model::{ParserInfo, RegistryError};
use super::traits::{describe, Parser};

/// Mutable registry state, always accessed under one lock.
#[derive(Default)]
struct RegistryState {
    /// Registration order
    parsers: Vec<Arc<dyn Parser>>,
    /// Primary names and aliases
    index: HashMap<String, Arc<dyn Parser>>,
    /// Priority-descending view, rebuilt lazily when `dirty`
    sorted: Vec<Arc<dyn Parser>>,
    dirty: bool,
    built_in: HashSet<String>,
}

impl RegistryState {
    fn sorted_view(&mut self) -> &[Arc<dyn Parser>] {
        if self.dirty {
            let mut sorted = self.parsers.clone();
            // stable: equal priorities keep registration order
            sorted.sort_by(|a, b| b.priority().cmp(&a.priority()));
            self.sorted = sorted;
            self.dirty = false;
        }
        &self.sorted
    }

    fn index_key(&mut self, key: &str, parser: &Arc<dyn Parser>) {
        if let Some(previous) = self.index.get(key) {
            if !Arc::ptr_eq(previous, parser) {
                warn!(
                    key = %key,
                    previous = %previous.format_name(),
                    replacement = %parser.format_name(),
                    "format key shadowed by later registration"
                );
            }
        }
        self.index.insert(key.to_string(), Arc::clone(parser));
    }

    /// Built-in parser answering to `key`, by primary name or alias.
    fn built_in_owner(&self, key: &str) -> Option<&str> {
        self.parsers
            .iter()
            .filter(|p| self.built_in.contains(p.format_name()))
            .find(|p| p.format_name() == key || p.aliases().iter().any(|a| a == key))
            .map(|p| p.format_name())
    }

    fn check_custom(&self, parser: &dyn Parser) -> Result<(), RegistryError> {
        let keys = std::iter::once(parser.format_name()).chain(parser.aliases().iter().map(String::as_str));
        for key in keys {
            if let Some(owner) = self.built_in_owner(key) {
                return Err(RegistryError::BuiltInKey { key: key.to_string(), owner: owner.to_string() });
            }
        }
        Ok(())
    }

    fn insert(&mut self, parser: Arc<dyn Parser>, built_in: bool) {
        let format_name = parser.format_name().to_string();
        if format_name.is_empty() {
            warn!("ignoring parser registration without a format name");
            return;
        }

        if self.remove(&format_name).is_some() {
            debug!(format = %format_name, "replacing registered parser");
        }

        self.index_key(&format_name, &parser);
        for alias in parser.aliases() {
            self.index_key(alias, &parser);
        }
        if built_in {
            self.built_in.insert(format_name);
        }
        self.parsers.push(parser);
        self.dirty = true;
    }

    /// Keys shadowed by the removed parser fall back to the latest
    /// remaining registration that claims them.
    fn remove(&mut self, format_name: &str) -> Option<Arc<dyn Parser>> {
        let pos = self.parsers.iter().position(|p| p.format_name() == format_name)?;
        let removed = self.parsers.remove(pos);

        self.index.clear();
        for parser in &self.parsers {
            self.index.insert(parser.format_name().to_string(), Arc::clone(parser));
            for alias in parser.aliases() {
                self.index.insert(alias.clone(), Arc::clone(parser));
            }
        }
        self.dirty = true;
        Some(removed)
    }
}

/// Central parser registry.
///
/// Lookups never fail loudly: absence is `None`/`false`/empty. Content
/// checks (`can_parse`) run on a snapshot taken under the lock, so a
/// concurrent registration is either fully visible or not at all.
pub struct ParserRegistry {
    state: Mutex<RegistryState>,
    commands: CommandMatcher,
}

impl ParserRegistry {
    /// Empty registry. Use [`build_registry`] for the populated one.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            commands: CommandMatcher::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // parsers never run under this lock, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a user-supplied parser. Replaces a custom parser with the
    /// same primary name; aliases overwrite existing custom keys. Neither
    /// the name nor an alias may claim a built-in's key.
    pub fn register(&self, parser: Arc<dyn Parser>) -> Result<(), RegistryError> {
        let mut state = self.lock();
        if let Err(err) = state.check_custom(parser.as_ref()) {
            warn!(format = %parser.format_name(), error = %err, "refusing registration");
            return Err(err);
        }
        state.insert(parser, false);
        Ok(())
    }

    pub(crate) fn register_built_in(&self, parser: Arc<dyn Parser>) {
        self.lock().insert(parser, true);
    }

    /// Remove a custom parser. Built-ins are never removed.
    pub fn unregister(&self, format_name: &str) -> bool {
        let mut state = self.lock();
        if state.built_in.contains(format_name) {
            warn!(format = %format_name, "refusing to unregister built-in parser");
            return false;
        }
        state.remove(format_name).is_some()
    }

    pub fn is_built_in(&self, format_name: &str) -> bool {
        self.lock().built_in.contains(format_name)
    }

    /// Lookup by primary name or alias.
    pub fn get_parser(&self, name: &str) -> Option<Arc<dyn Parser>> {
        self.lock().index.get(name).cloned()
    }

    pub fn has_format(&self, name: &str) -> bool {
        self.lock().index.contains_key(name)
    }

    /// Priority-ordered snapshot (highest first, ties in registration order).
    pub fn by_priority(&self) -> Vec<Arc<dyn Parser>> {
        self.lock().sorted_view().to_vec()
    }

    /// Auto-detection: the first parser in priority order whose
    /// `can_parse` accepts the content.
    pub fn find_parser(&self, content: &str) -> Option<Arc<dyn Parser>> {
        let found = self.by_priority().into_iter().find(|p| p.can_parse(content));
        match &found {
            Some(p) => debug!(format = %p.format_name(), "content detected"),
            None => debug!("no parser accepted content"),
        }
        found
    }

    /// Infer a parser from the command that produced the output.
    /// Only a strictly higher priority displaces an earlier match.
    pub fn find_parser_by_command(&self, command: &str) -> Option<Arc<dyn Parser>> {
        let normalized = normalize_command(command);
        let mut best: Option<Arc<dyn Parser>> = None;

        for parser in self.by_priority() {
            if let Some(current) = &best {
                // sorted descending: nothing later can be strictly higher
                if parser.priority() <= current.priority() {
                    break;
                }
            }
            let hit = parser
                .command_patterns()
                .iter()
                .any(|pattern| self.commands.matches(&normalized, pattern));
            if hit {
                best = Some(parser);
            }
        }

        best
    }

    pub fn parsers_by_category(&self, category: &str) -> Vec<Arc<dyn Parser>> {
        self.filtered(|p| p.category() == category)
    }

    pub fn parsers_by_group(&self, group: &str) -> Vec<Arc<dyn Parser>> {
        self.filtered(|p| p.groups().iter().any(|g| g == group))
    }

    fn filtered<F>(&self, keep: F) -> Vec<Arc<dyn Parser>>
    where
        F: Fn(&Arc<dyn Parser>) -> bool,
    {
        let mut selected: Vec<Arc<dyn Parser>> = self.lock().parsers.iter().filter(|p| keep(p)).cloned().collect();
        selected.sort_by(|a, b| b.priority().cmp(&a.priority()));
        selected
    }

    pub fn is_group(&self, name: &str) -> bool {
        self.lock().parsers.iter().any(|p| p.groups().iter().any(|g| g == name))
    }

    /// Descriptor snapshot sorted by (category, format_name).
    pub fn all_formats(&self) -> Vec<ParserInfo> {
        let state = self.lock();
        let mut infos: Vec<ParserInfo> = state
            .parsers
            .iter()
            .map(|p| describe(p.as_ref(), state.built_in.contains(p.format_name())))
            .collect();
        infos.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.format_name.cmp(&b.format_name)));
        infos
    }

    pub fn len(&self) -> usize {
        self.lock().parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().parsers.is_empty()
    }

    /// Reset everything, built-ins included.
    pub fn clear(&self) {
        *self.lock() = RegistryState::default();
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Construct a registry holding every built-in parser.
pub fn build_registry() -> ParserRegistry {
    let registry = ParserRegistry::new();
    for parser in formats::built_in_parsers() {
        registry.register_built_in(parser);
    }
    info!(parsers = registry.len(), "parser registry initialized");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::model::{CommandPattern, RegistryError, ValidationEvent};
    use crate::parser::traits::ParserMeta;

    struct StubParser {
        meta: ParserMeta,
        marker: &'static str,
    }

    impl StubParser {
        fn arc(name: &str, priority: i32, marker: &'static str) -> Arc<dyn Parser> {
            Arc::new(Self { meta: ParserMeta::new(name, name, "tool_output", "stub", priority), marker })
        }

        fn with_meta(meta: ParserMeta, marker: &'static str) -> Arc<dyn Parser> {
            Arc::new(Self { meta, marker })
        }
    }

    impl Parser for StubParser {
        fn can_parse(&self, content: &str) -> bool {
            content.contains(self.marker)
        }

        fn parse(&self, _content: &str) -> Vec<ValidationEvent> {
            Vec::new()
        }

        fn meta(&self) -> &ParserMeta {
            &self.meta
        }
    }

    // ── Detection ────────────────────────────────────────────────

    #[test]
    fn test_find_parser_prefers_priority() {
        let registry = ParserRegistry::new();
        registry.register(StubParser::arc("low", 10, "x")).unwrap();
        registry.register(StubParser::arc("high", 90, "x")).unwrap();
        registry.register(StubParser::arc("mid", 50, "x")).unwrap();

        let found = registry.find_parser("x").unwrap();
        assert_eq!(found.format_name(), "high");
    }

    #[test]
    fn test_find_parser_ties_keep_registration_order() {
        let registry = ParserRegistry::new();
        registry.register(StubParser::arc("first", 50, "x")).unwrap();
        registry.register(StubParser::arc("second", 50, "x")).unwrap();

        for _ in 0..10 {
            assert_eq!(registry.find_parser("x").unwrap().format_name(), "first");
        }
    }

    #[test]
    fn test_find_parser_resorts_after_registration() {
        let registry = ParserRegistry::new();
        registry.register(StubParser::arc("a", 10, "x")).unwrap();
        assert_eq!(registry.find_parser("x").unwrap().format_name(), "a");

        registry.register(StubParser::arc("b", 20, "x")).unwrap();
        assert_eq!(registry.find_parser("x").unwrap().format_name(), "b");
    }

    #[test]
    fn test_find_parser_none() {
        let registry = ParserRegistry::new();
        registry.register(StubParser::arc("a", 10, "needle")).unwrap();
        assert!(registry.find_parser("haystack").is_none());
    }

    // ── Lookup ───────────────────────────────────────────────────

    #[test]
    fn test_alias_resolves_to_same_instance() {
        let registry = ParserRegistry::new();
        let meta = ParserMeta::new("gcc_like", "Gcc", "build_system", "", 80).aliases(&["gcc", "cc"]);
        registry.register(StubParser::with_meta(meta, "x")).unwrap();

        let primary = registry.get_parser("gcc_like").unwrap();
        for alias in ["gcc", "cc"] {
            let via_alias = registry.get_parser(alias).unwrap();
            assert!(Arc::ptr_eq(&primary, &via_alias));
        }
        assert!(registry.has_format("cc"));
        assert!(registry.get_parser("clang").is_none());
    }

    #[test]
    fn test_alias_collision_later_registration_wins() {
        let registry = ParserRegistry::new();
        registry.register(StubParser::arc("pytest", 100, "x")).unwrap();
        let meta = ParserMeta::new("other", "Other", "tool_output", "", 10).aliases(&["pytest"]);
        registry.register(StubParser::with_meta(meta, "x")).unwrap();

        assert_eq!(registry.get_parser("pytest").unwrap().format_name(), "other");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_same_name_replaces() {
        let registry = ParserRegistry::new();
        registry.register(StubParser::arc("custom", 10, "old")).unwrap();
        registry.register(StubParser::arc("custom", 10, "new")).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.find_parser("new").is_some());
        assert!(registry.find_parser("old").is_none());
    }

    #[test]
    fn test_empty_name_registration_ignored() {
        let registry = ParserRegistry::new();
        registry.register(StubParser::arc("", 10, "x")).unwrap();
        assert!(registry.is_empty());
    }

    // ── Groups & categories ──────────────────────────────────────

    #[test]
    fn test_group_union_sorted_and_stable() {
        let registry = ParserRegistry::new();
        let mk = |name: &str, prio: i32, groups: &[&str]| {
            StubParser::with_meta(ParserMeta::new(name, name, "linting_tool", "", prio).groups(groups), "x")
        };
        registry.register(mk("a", 50, &["python"])).unwrap();
        registry.register(mk("b", 80, &["python", "lint"])).unwrap();
        registry.register(mk("c", 50, &["python"])).unwrap();
        registry.register(mk("d", 99, &["rust"])).unwrap();

        let names: Vec<String> = registry
            .parsers_by_group("python")
            .iter()
            .map(|p| p.format_name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);

        assert!(registry.is_group("lint"));
        assert!(!registry.is_group("b"));
        assert!(registry.parsers_by_group("go").is_empty());
    }

    #[test]
    fn test_all_formats_sorted_by_category_then_name() {
        let registry = ParserRegistry::new();
        registry.register(StubParser::with_meta(ParserMeta::new("zeta", "", "build_system", "", 1), "x")).unwrap();
        registry.register(StubParser::with_meta(ParserMeta::new("beta", "", "test_framework", "", 100), "x")).unwrap();
        registry.register(StubParser::with_meta(ParserMeta::new("alpha", "", "build_system", "", 5), "x")).unwrap();

        let names: Vec<String> = registry.all_formats().into_iter().map(|i| i.format_name).collect();
        assert_eq!(names, vec!["alpha", "zeta", "beta"]);
        assert_eq!(registry.parsers_by_category("build_system").len(), 2);
    }

    // ── Commands ─────────────────────────────────────────────────

    #[test]
    fn test_command_literal_beats_lower_like() {
        let registry = ParserRegistry::new();
        let like = ParserMeta::new("py_like", "", "tool_output", "", 60).commands(vec![CommandPattern::like("py%")]);
        let literal =
            ParserMeta::new("pytest_lit", "", "tool_output", "", 80).commands(vec![CommandPattern::literal("pytest")]);
        registry.register(StubParser::with_meta(like, "x")).unwrap();
        registry.register(StubParser::with_meta(literal, "x")).unwrap();

        assert_eq!(registry.find_parser_by_command("pytest tests/").unwrap().format_name(), "pytest_lit");
        assert_eq!(registry.find_parser_by_command("/usr/bin/pytest").unwrap().format_name(), "pytest_lit");
        assert_eq!(registry.find_parser_by_command("pylint src").unwrap().format_name(), "py_like");
    }

    #[test]
    fn test_command_higher_priority_wins() {
        let registry = ParserRegistry::new();
        let high = ParserMeta::new("first", "", "tool_output", "", 80)
            .commands(vec![CommandPattern::literal("pytest"), CommandPattern::like("pytest %")]);
        let low = ParserMeta::new("second", "", "tool_output", "", 60).commands(vec![CommandPattern::like("py%")]);
        registry.register(StubParser::with_meta(low, "x")).unwrap();
        registry.register(StubParser::with_meta(high, "x")).unwrap();

        assert_eq!(registry.find_parser_by_command("pytest tests/").unwrap().format_name(), "first");
    }

    #[test]
    fn test_command_equal_priority_keeps_first() {
        let registry = ParserRegistry::new();
        let a = ParserMeta::new("a", "", "tool_output", "", 50).commands(vec![CommandPattern::like("tool%")]);
        let b = ParserMeta::new("b", "", "tool_output", "", 50).commands(vec![CommandPattern::regexp("^tool")]);
        registry.register(StubParser::with_meta(a, "x")).unwrap();
        registry.register(StubParser::with_meta(b, "x")).unwrap();

        assert_eq!(registry.find_parser_by_command("tool run").unwrap().format_name(), "a");
        assert!(registry.find_parser_by_command("other").is_none());
    }

    // ── Lifecycle ────────────────────────────────────────────────

    #[test]
    fn test_unregister_custom_and_built_in() {
        let registry = ParserRegistry::new();
        registry.register_built_in(StubParser::arc("core", 10, "x"));
        registry.register(StubParser::arc("mine", 10, "x")).unwrap();

        assert!(!registry.unregister("core"));
        assert!(registry.get_parser("core").is_some());
        assert!(registry.is_built_in("core"));

        assert!(registry.unregister("mine"));
        assert!(!registry.unregister("mine"));
        assert!(!registry.has_format("mine"));
    }

    #[test]
    fn test_unregister_restores_shadowed_keys() {
        let registry = ParserRegistry::new();
        let first = ParserMeta::new("first", "", "tool_output", "", 10).aliases(&["shared"]);
        let second = ParserMeta::new("second", "", "tool_output", "", 10).aliases(&["shared"]);
        registry.register(StubParser::with_meta(first, "x")).unwrap();
        registry.register(StubParser::with_meta(second, "x")).unwrap();
        assert_eq!(registry.get_parser("shared").unwrap().format_name(), "second");

        assert!(registry.unregister("second"));
        assert_eq!(registry.get_parser("shared").unwrap().format_name(), "first");
        assert!(registry.has_format("first"));
    }

    #[test]
    fn test_custom_cannot_claim_built_in_keys() {
        let registry = build_registry();
        let attempts: [(&str, &[&str]); 3] = [("gcc_text", &[]), ("mine", &["gcc_text"]), ("mine", &["cc", "gcc"])];
        for (name, aliases) in attempts {
            let meta = ParserMeta::new(name, "", "tool_output", "", 10).aliases(aliases);
            let err = registry.register(StubParser::with_meta(meta, "x")).unwrap_err();
            assert!(matches!(err, RegistryError::BuiltInKey { owner, .. } if owner == "gcc_text"));
        }

        assert!(!registry.has_format("mine"));
        assert_eq!(registry.get_parser("gcc").unwrap().format_name(), "gcc_text");
        assert!(!registry.unregister("gcc_text"));
        assert!(registry.is_built_in("gcc_text"));
    }

    // ── Concurrency ──────────────────────────────────────────────

    #[test]
    fn test_concurrent_register_and_query() {
        let registry = ParserRegistry::new();
        let base = ParserMeta::new("base", "", "tool_output", "", 1).groups(&["g"]);
        registry.register_built_in(StubParser::with_meta(base, "x"));

        std::thread::scope(|s| {
            for t in 0..4 {
                let registry = &registry;
                s.spawn(move || {
                    for i in 0..50 {
                        let name = format!("p{}_{}", t, i);
                        let meta = ParserMeta::new(&name, &name, "tool_output", "", 10 + i).groups(&["g"]);
                        registry.register(StubParser::with_meta(meta, "x")).unwrap();

                        // a completed registration is visible to the next read
                        assert!(registry.by_priority().iter().any(|p| p.format_name() == name));
                        assert!(registry.parsers_by_group("g").iter().any(|p| p.format_name() == name));
                        assert!(registry.get_parser(&name).is_some());
                    }
                });
            }
            for _ in 0..2 {
                s.spawn(|| {
                    for _ in 0..200 {
                        let view = registry.by_priority();
                        assert!(view.windows(2).all(|w| w[0].priority() >= w[1].priority()));
                        assert!(registry.find_parser("x").is_some());
                    }
                });
            }
        });

        assert_eq!(registry.len(), 201);
        assert_eq!(registry.by_priority().len(), 201);
        assert_eq!(registry.find_parser("x").unwrap().priority(), 59);
        assert_eq!(registry.parsers_by_group("g").last().unwrap().format_name(), "base");
    }

    #[test]
    fn test_clear_resets_state() {
        let registry = build_registry();
        assert!(!registry.is_empty());
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.find_parser("src/a.c:1:1: error: x").is_none());
        assert!(!registry.is_built_in("gcc_text"));
    }

    #[test]
    fn test_build_registry_has_built_ins() {
        let registry = build_registry();
        for name in ["gcc_text", "generic_error", "generic_lint", "pytest_text", "eslint_json", "junit_xml"] {
            assert!(registry.has_format(name), "missing {}", name);
            assert!(registry.is_built_in(name));
        }
        assert!(registry.is_group("python"));
    }
}
