//! Fully-qualified name handling.
//!
//! Descriptors refer to types with a leading dot (`.pkg.Message`); every key
//! stored in the context drops it.

/// Strips the leading `.` from a fully-qualified name, if present.
pub fn strip_leading_dot(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}

/// Joins a parent fully-qualified name and a child segment. An empty parent
/// (a file without a package, a top-level declaration) yields the bare name.
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_a_single_leading_dot() {
        assert_eq!("pkg.Outer.Inner", strip_leading_dot(".pkg.Outer.Inner"));
        assert_eq!("pkg.Outer.Inner", strip_leading_dot("pkg.Outer.Inner"));
        assert_eq!(".pkg", strip_leading_dot("..pkg"));
        assert_eq!("", strip_leading_dot(""));
        assert_eq!("", strip_leading_dot("."));
    }

    #[test]
    fn joins_against_empty_and_non_empty_prefixes() {
        assert_eq!("M", join("", "M"));
        assert_eq!("p.M", join("p", "M"));
        assert_eq!("p.Outer.Inner", join("p.Outer", "Inner"));
    }
}
