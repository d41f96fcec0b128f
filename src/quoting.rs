/// Quote `name` as a SQL identifier: wrap it in double quotes and double any
/// embedded double quote.
///
/// This is the only place names are spliced into SQL text. Values always go
/// through bound parameters.
#[must_use]
pub fn quoted_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
