use tera::Context as TeraContext;

use super::{PlatformKind, ScriptBackend, ScriptParams, ensure_disjoint, generation_failed, path_text, render_template};
use crate::core::Result;

// `timeout` refuses to run with redirected stdin, `ping` works detached.
// The final line is parsed as one block before it runs, so the batch file can
// delete its own directory and itself without cmd.exe failing on the next read.
const TEMPLATE: &str = r#"@echo off
rem Restart script generated by selfswap. Safe to delete.
setlocal

set "STAGED_DIR={{ staged_dir }}"
set "INSTALL_DIR={{ install_dir }}"
set "TEMP_DIR={{ temp_dir }}"
set "TARGET=%INSTALL_DIR%\{{ executable }}"
{% if interpreter %}set "INTERPRETER={{ interpreter }}"
{% endif %}
ping -n {{ ping_count }} 127.0.0.1 >nul

if not exist "%INSTALL_DIR%" mkdir "%INSTALL_DIR%"
xcopy "%STAGED_DIR%\*" "%INSTALL_DIR%\" /E /H /Y /I /Q >nul
if errorlevel 2 exit /b 1

cd /d "%INSTALL_DIR%"
{% if interpreter %}start "" "%INTERPRETER%" "%TARGET%"
{% else %}start "" "%TARGET%"
{% endif %}
(goto) 2>nul & rmdir /S /Q "%TEMP_DIR%" & del /F /Q "%~f0"
"#;

/// `cmd.exe` batch restart script.
///
/// Values are placed inside `set "NAME=value"` where only `%` needs escaping.
/// Double quotes and line breaks cannot be represented and are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsBatch;

/// Escape `value` for use inside a quoted `set` assignment.
pub fn batch_escape(label: &str, value: &str) -> Result<String> {
    if value.contains(['"', '\r', '\n']) {
        return Err(generation_failed(format!(
            "{label} contains a quote or line break, which batch files cannot represent: {value:?}"
        )));
    }
    Ok(value.replace('%', "%%"))
}

fn is_absolute_windows(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with(r"\\")
        || (bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'\\' | b'/'))
}

impl ScriptBackend for WindowsBatch {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Windows
    }

    fn file_name(&self) -> &'static str {
        "restart.bat"
    }

    fn render(&self, params: &ScriptParams) -> Result<String> {
        let staged = path_text("staged directory", &params.staged_dir)?;
        let install = path_text("install directory", &params.install_dir)?;
        let temp = path_text("temp directory", &params.temp_dir)?;

        for (label, value) in [("staged", staged), ("install", install), ("temp", temp)] {
            if !is_absolute_windows(value) {
                return Err(generation_failed(format!("{label} directory '{value}' is not absolute")));
            }
        }
        ensure_disjoint(&install.replace('/', "\\"), &temp.replace('/', "\\"), '\\', true)?;

        let mut context = TeraContext::new();
        context.insert("staged_dir", &batch_escape("staged directory", staged.trim_end_matches(['\\', '/']))?);
        context.insert("install_dir", &batch_escape("install directory", install.trim_end_matches(['\\', '/']))?);
        context.insert("temp_dir", &batch_escape("temp directory", temp.trim_end_matches(['\\', '/']))?);
        context.insert("executable", &batch_escape("executable", &params.executable.replace('/', "\\"))?);
        let interpreter = match &params.interpreter {
            Some(path) => Some(batch_escape("interpreter", path_text("interpreter", path)?)?),
            None => None,
        };
        context.insert("interpreter", &interpreter);
        // ping waits about one second between echoes
        context.insert("ping_count", &(params.grace_delay.as_secs() + 1));

        let script = render_template(TEMPLATE, &context)?;
        Ok(script.replace('\n', "\r\n"))
    }
}
