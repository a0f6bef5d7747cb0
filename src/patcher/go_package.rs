use super::{Patcher, proto};
use crate::error::PatchError;

const GO_PACKAGE_OPTION: &str = "go_package";

/// Points `option go_package` at the Go package the file will be generated
/// into: `<go module>/<output dir>;<last dir segment>`.
///
/// An existing directive is rewritten in place; otherwise one is inserted
/// right after the syntax declaration. Only the bytes of that one statement
/// change, so anything sharing its lines is kept.
#[derive(Debug, Clone)]
pub struct GoPackagePatcher {
    go_module: String,
}

impl GoPackagePatcher {
    pub fn new(go_module: impl Into<String>) -> Self {
        Self {
            go_module: go_module.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn directive(&self, output_dir: &str) -> String {
        let output_dir = output_dir.trim_matches('/');
        let package_name = output_dir.rsplit('/').next().unwrap_or(output_dir);
        format!(
            r#"option go_package = "{}/{};{}";"#,
            self.go_module, output_dir, package_name
        )
    }
}

impl Patcher for GoPackagePatcher {
    fn patch(&self, output_dir: &str, content: &str) -> Result<String, PatchError> {
        let outline = proto::parse(content)?;
        let directive = self.directive(output_dir);

        if let Some(span) = outline.option(GO_PACKAGE_OPTION) {
            return Ok(format!(
                "{}{}{}",
                &content[..span.start],
                directive,
                &content[span.end..]
            ));
        }

        let syntax = outline.syntax.ok_or(PatchError::MissingSyntax)?;
        Ok(insert_after(content, syntax.end, &directive))
    }
}

/// Put `directive` on its own line after the statement ending at `offset`.
///
/// When the rest of that line is blank the directive goes on the next line;
/// otherwise it is placed between the statement and whatever follows it.
/// CRLF files stay CRLF.
fn insert_after(content: &str, offset: usize, directive: &str) -> String {
    let rest = &content[offset..];
    let line_end = rest.find('\n');
    let tail = &rest[..line_end.unwrap_or(rest.len())];
    let newline = if tail.ends_with('\r') || content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    };

    let mut patched = String::with_capacity(content.len() + directive.len() + newline.len());
    match line_end {
        Some(i) if tail.trim().is_empty() => {
            let at = offset + i + 1;
            patched.push_str(&content[..at]);
            patched.push_str(directive);
            patched.push_str(newline);
            patched.push_str(&content[at..]);
        }
        None if tail.trim().is_empty() => {
            patched.push_str(content);
            patched.push_str(newline);
            patched.push_str(directive);
        }
        _ => {
            patched.push_str(&content[..offset]);
            patched.push_str(newline);
            patched.push_str(directive);
            patched.push_str(rest);
        }
    }
    patched
}
