/// Compile a regular expression literal once, on first use.
///
/// The literal is a constant of the crate, so a failure to compile is a bug
/// caught by the first test that reaches it.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}
