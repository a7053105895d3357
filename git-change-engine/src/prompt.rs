//! Fixed prompt templates.
//!
//! The instruction and the source document are substituted in a single
//! `format!` pass, so placeholder-looking text inside either value is
//! passed through literally.

use crate::parser::ReplyGrammar;

const PREAMBLE: &str = "You are modifying a software repository. \
The complete repository follows, one fenced block per file, each block labeled with the file's relative path.";

const FENCED_RULES: &str = "Reply with the FULL new content of every file you change or create, \
each in its own fenced block whose opening fence is immediately followed by the relative path, for example:\n\
```src/main.py\n<entire file content>\n```\n\
Do not put any other fenced blocks in the reply. If no change is needed, reply with exactly: No changes";

const DIFF_RULES: &str = "Reply with one unified diff record per changed file, each starting with a \
`diff --git a/<path> b/<path>` line followed by `--- a/<path>`, `+++ b/<path>` and the hunks. \
Use `--- /dev/null` for new files. If no change is needed, reply with exactly: No changes";

/// Builds the text sent to the completion API.
///
/// `Auto` asks for fenced blocks; the parser still accepts diffs.
pub fn build_prompt(instruction: &str, source: &str, grammar: ReplyGrammar) -> String {
    let rules = match grammar {
        ReplyGrammar::Diff => DIFF_RULES,
        ReplyGrammar::Fenced | ReplyGrammar::Auto => FENCED_RULES,
    };
    format!("{PREAMBLE}\n\n{source}\nChange request:\n{instruction}\n\n{rules}\n")
}
