//! Script block evaluation and removal.

use ks_core::BrowserResult;
use ks_js::JsRuntimeConfig;
use ks_js::ScriptEngine;

use crate::patterns;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub run: usize,
    pub failed: usize,
}

/// Evaluates each script block left to right in one fresh engine, then
/// removes every block regardless of how its evaluation went.
pub fn run_scripts(markup: &str, config: &JsRuntimeConfig) -> BrowserResult<(String, ScriptSummary)> {
    let pattern = patterns::script_block()?;
    let mut summary = ScriptSummary::default();
    let mut engine: Option<ScriptEngine> = None;

    for (index, captures) in pattern.captures_iter(markup).enumerate() {
        let source = captures.get(1).map_or("", |inner| inner.as_str());
        let engine = engine.get_or_insert_with(|| ScriptEngine::new(config.clone()));

        summary.run += 1;
        if let Err(error) = engine.evaluate(source) {
            summary.failed += 1;
            tracing::warn!(
                script = index,
                code = error.code,
                "script evaluation failed: {}",
                error.message
            );
        }
    }

    if summary.run == 0 {
        return Ok((markup.to_owned(), summary));
    }
    Ok((pattern.replace_all(markup, "").into_owned(), summary))
}
