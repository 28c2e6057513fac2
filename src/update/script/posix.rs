use tera::Context as TeraContext;

use super::{PlatformKind, ScriptBackend, ScriptParams, ensure_disjoint, generation_failed, path_text, render_template};
use crate::core::Result;

const TEMPLATE: &str = r#"#!/bin/sh
# Restart script generated by selfswap. Safe to delete.

STAGED_DIR={{ staged_dir }}
INSTALL_DIR={{ install_dir }}
TEMP_DIR={{ temp_dir }}
TARGET="$INSTALL_DIR"/{{ executable }}
{% if interpreter %}INTERPRETER={{ interpreter }}
{% endif %}
sleep {{ grace_secs }}

mkdir -p "$INSTALL_DIR" || exit 1
cp -Rf "$STAGED_DIR"/. "$INSTALL_DIR"/ || exit 1
{% if interpreter %}
cd "$INSTALL_DIR" || exit 1
nohup "$INTERPRETER" "$TARGET" >/dev/null 2>&1 &
{% else %}
chmod +x "$TARGET" 2>/dev/null
cd "$INSTALL_DIR" || exit 1
nohup "$TARGET" >/dev/null 2>&1 &
{% endif %}
rm -rf "$TEMP_DIR"
rm -f -- "$0"
exit 0
"#;

/// `/bin/sh` restart script.
///
/// Every value is single-quoted, so no character in a path is interpreted
/// by the shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixShell;

/// Wrap `value` in single quotes, closing and escaping embedded quotes.
pub fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl ScriptBackend for PosixShell {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Posix
    }

    fn file_name(&self) -> &'static str {
        "restart.sh"
    }

    fn render(&self, params: &ScriptParams) -> Result<String> {
        let staged = path_text("staged directory", &params.staged_dir)?;
        let install = path_text("install directory", &params.install_dir)?;
        let temp = path_text("temp directory", &params.temp_dir)?;

        for (label, value) in [("staged", staged), ("install", install), ("temp", temp)] {
            if !value.starts_with('/') {
                return Err(generation_failed(format!("{label} directory '{value}' is not absolute")));
            }
        }
        if temp.trim_end_matches('/').is_empty() {
            return Err(generation_failed("temp directory cannot be the filesystem root"));
        }
        ensure_disjoint(install, temp, '/', false)?;

        let mut context = TeraContext::new();
        context.insert("staged_dir", &sh_quote(staged));
        context.insert("install_dir", &sh_quote(install));
        context.insert("temp_dir", &sh_quote(temp));
        context.insert("executable", &sh_quote(&params.executable));
        let interpreter = match &params.interpreter {
            Some(path) => Some(sh_quote(path_text("interpreter", path)?)),
            None => None,
        };
        context.insert("interpreter", &interpreter);
        context.insert("grace_secs", &params.grace_delay.as_secs());

        render_template(TEMPLATE, &context)
    }
}
