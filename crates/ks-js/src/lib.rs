//! Bare ECMAScript evaluation with no document or host bindings.

use boa_engine::Context;
use boa_engine::JsValue;
use boa_engine::Source;
use ks_core::BrowserError;
use ks_core::BrowserResult;

/// Limits applied to every script context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsRuntimeConfig {
    /// Scripts larger than this are rejected without evaluation.
    pub max_script_bytes: usize,
    pub recursion_limit: usize,
    pub stack_size_limit: usize,
    pub loop_iteration_limit: u64,
}

impl Default for JsRuntimeConfig {
    fn default() -> Self {
        Self {
            max_script_bytes: 2 * 1024 * 1024,
            recursion_limit: 64,
            stack_size_limit: 1024,
            loop_iteration_limit: 100_000,
        }
    }
}

/// A scripting context. Globals persist across `evaluate` calls on the same
/// engine; create a new engine for an independent run.
pub struct ScriptEngine {
    context: Context,
    config: JsRuntimeConfig,
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScriptEngine {
    pub fn new(config: JsRuntimeConfig) -> Self {
        let mut context = Context::default();
        let limits = context.runtime_limits_mut();
        limits.set_recursion_limit(config.recursion_limit);
        limits.set_stack_size_limit(config.stack_size_limit);
        limits.set_loop_iteration_limit(config.loop_iteration_limit);

        Self { context, config }
    }

    /// Runs `source` for its side effects; the completion value is dropped.
    pub fn evaluate(&mut self, source: &str) -> BrowserResult<()> {
        self.eval_value(source).map(|_| ())
    }

    /// Runs `source` and converts the completion value with `String(value)`.
    #[cfg(test)]
    fn evaluate_to_string(&mut self, source: &str) -> BrowserResult<String> {
        let value = self.eval_value(source)?;
        let js_string = value.to_string(&mut self.context).map_err(|error| {
            BrowserError::new(
                "js.value_conversion_failed",
                format!("could not convert result to string: {error}"),
            )
        })?;
        Ok(js_string.to_std_string_escaped())
    }

    fn eval_value(&mut self, source: &str) -> BrowserResult<JsValue> {
        if source.len() > self.config.max_script_bytes {
            return Err(BrowserError::new(
                "js.script_too_large",
                format!(
                    "script of {} bytes exceeds the {} byte limit",
                    source.len(),
                    self.config.max_script_bytes
                ),
            ));
        }

        self.context
            .eval(Source::from_bytes(source.as_bytes()))
            .map_err(|error| BrowserError::new("js.eval_failed", error.to_string()))
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(JsRuntimeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::JsRuntimeConfig;
    use super::ScriptEngine;

    #[test]
    fn evaluates_expressions() {
        let mut engine = ScriptEngine::default();
        assert!(engine.evaluate("1 + 1").is_ok());
        assert_eq!(engine.evaluate_to_string("6 * 7"), Ok("42".to_owned()));
    }

    #[test]
    fn reports_thrown_errors() {
        let mut engine = ScriptEngine::default();
        match engine.evaluate("throw new Error('boom')") {
            Ok(()) => panic!("expected an error"),
            Err(error) => {
                assert_eq!(error.code, "js.eval_failed");
                assert!(error.message.contains("boom"));
            }
        }
    }

    #[test]
    fn reports_syntax_errors() {
        let mut engine = ScriptEngine::default();
        assert!(engine.evaluate("function (").is_err());
    }

    #[test]
    fn has_no_document_bindings() {
        let mut engine = ScriptEngine::default();
        assert_eq!(
            engine.evaluate_to_string("typeof document + ',' + typeof window"),
            Ok("undefined,undefined".to_owned())
        );
        assert!(engine.evaluate("document.title = 'x'").is_err());
    }

    #[test]
    fn globals_persist_within_one_engine_only() {
        let mut first = ScriptEngine::default();
        assert!(first.evaluate("var counter = 1;").is_ok());
        assert_eq!(first.evaluate_to_string("counter + 1"), Ok("2".to_owned()));

        let mut second = ScriptEngine::default();
        assert_eq!(
            second.evaluate_to_string("typeof counter"),
            Ok("undefined".to_owned())
        );
    }

    #[test]
    fn runaway_loops_hit_the_iteration_limit() {
        let mut engine = ScriptEngine::new(JsRuntimeConfig {
            loop_iteration_limit: 1_000,
            ..JsRuntimeConfig::default()
        });
        assert!(engine.evaluate("while (true) {}").is_err());
        assert!(engine.evaluate("1").is_ok());
    }

    #[test]
    fn unbounded_recursion_is_an_error() {
        let mut engine = ScriptEngine::default();
        assert!(engine.evaluate("function f() { return f(); } f();").is_err());
    }

    #[test]
    fn oversized_scripts_are_rejected() {
        let mut engine = ScriptEngine::new(JsRuntimeConfig {
            max_script_bytes: 8,
            ..JsRuntimeConfig::default()
        });
        match engine.evaluate("var value = 123456;") {
            Ok(()) => panic!("expected an error"),
            Err(error) => assert_eq!(error.code, "js.script_too_large"),
        }
    }
}
