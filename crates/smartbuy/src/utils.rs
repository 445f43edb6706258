/// Upper-cases the first cased character of every word and lower-cases the rest.
///
/// A word starts after any character that has no case, so `"tv, 4k-oled"`
/// becomes `"Tv, 4K-Oled"`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_cased = false;
    for c in text.chars() {
        let cased = c.is_uppercase() || c.is_lowercase();
        if cased && !previous_cased {
            out.extend(c.to_uppercase());
        } else if cased {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        previous_cased = cased;
    }
    out
}
