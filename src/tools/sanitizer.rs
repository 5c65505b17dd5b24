//! Argument Sanitization
//!
//! This module is the last line of defense against shell injection. The
//! wrapped tool may be invoked through a shell-interpreting spawn path, so
//! any character a shell could interpret is deleted outright rather than
//! escaped. This trades strict correctness (legitimate content containing a
//! metacharacter is mangled) for simplicity and safety.

/// Characters a shell could interpret as syntax rather than data.
///
/// - `;` : Command separator
/// - `&` : Background execution
/// - `|` : Pipe
/// - `` ` `` : Command substitution
/// - `$` : Variable expansion
/// - `( )` : Subshell
/// - `{ }` : Brace expansion
/// - `[ ]` : Glob character class
/// - `< >` : Redirection
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '<', '>',
];

/// Sanitize a list of command arguments.
///
/// Each argument has shell metacharacters removed, runs of whitespace
/// collapsed to a single space, and leading/trailing whitespace trimmed.
/// Arguments that become empty are dropped; the relative order of the
/// survivors is preserved.
///
/// The function is pure and idempotent: sanitizing already-sanitized
/// arguments is a no-op.
///
/// # Example
///
/// ```
/// use toolguard::tools::sanitize_args;
///
/// let args = vec!["arg1; rm -rf /".to_string(), "   ".to_string()];
/// assert_eq!(sanitize_args(&args), vec!["arg1 rm -rf /".to_string()]);
/// ```
pub fn sanitize_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| sanitize_arg(arg))
        .filter(|arg| !arg.is_empty())
        .collect()
}

/// Sanitize a single argument: strip metacharacters, normalize whitespace.
fn sanitize_arg(arg: &str) -> String {
    let stripped: String = arg
        .chars()
        .filter(|c| !SHELL_METACHARACTERS.contains(c))
        .collect();

    // split_whitespace both collapses runs and trims the ends
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
