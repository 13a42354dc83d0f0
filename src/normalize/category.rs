use crate::product::Gender;

/// Fabric keywords promoted to tags when they appear in category labels.
const FABRIC_KEYWORDS: [&str; 3] = ["cashmere", "wool", "cotton"];

/// Tokens in a category label that mark a listing as menswear.
const MENS_TOKENS: [&str; 3] = ["men", "mens", "men's"];

/// Derive a display category from a category URI slug.
///
/// Takes the last path segment, replaces dashes with spaces and title-cases
/// each word: `"men/knitwear/cashmere-jumpers"` -> `"Cashmere Jumpers"`.
/// A slug without path separators carries no usable segment.
pub fn category_label(category_uri: Option<&str>) -> Option<String> {
    let uri = category_uri?;
    if !uri.contains('/') {
        return None;
    }
    let segment = uri.rsplit('/').next()?;
    let label = segment
        .split('-')
        .filter(|w| !w.is_empty())
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ");
    (!label.is_empty()).then_some(label)
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Bucket a listing by scanning its category labels for a men's token.
///
/// Token match, not substring: `"Women's Dresses"` must stay `Woman`.
/// Ambiguous or empty category lists default to `Woman`.
pub fn infer_gender(categories: &[String]) -> Gender {
    let is_mens = categories.iter().any(|cat| {
        cat.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .any(|token| MENS_TOKENS.contains(&token))
    });
    if is_mens {
        Gender::Man
    } else {
        Gender::Woman
    }
}

/// Collect known fabric keywords appearing in any category label.
///
/// At most one entry per keyword, in the fixed keyword order. An empty result
/// is `None` so the stored field reads as absent.
pub fn fabric_tags(categories: &[String]) -> Option<Vec<String>> {
    let lowered: Vec<String> = categories.iter().map(|c| c.to_lowercase()).collect();
    let tags: Vec<String> = FABRIC_KEYWORDS
        .iter()
        .filter(|kw| lowered.iter().any(|cat| cat.contains(**kw)))
        .map(|kw| kw.to_string())
        .collect();
    (!tags.is_empty()).then_some(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn derives_title_cased_label_from_slug() {
        assert_eq!(
            category_label(Some("men/knitwear/cashmere-jumpers")).as_deref(),
            Some("Cashmere Jumpers")
        );
        assert_eq!(category_label(Some("women/dresses")).as_deref(), Some("Dresses"));
    }

    #[test]
    fn slug_without_separator_has_no_label() {
        assert_eq!(category_label(Some("knitwear")), None);
        assert_eq!(category_label(None), None);
    }

    #[test]
    fn mens_token_marks_listing_as_man() {
        assert_eq!(infer_gender(&cats(&["Men's Knitwear"])), Gender::Man);
        assert_eq!(infer_gender(&cats(&["Dresses", "MENS SHIRTS"])), Gender::Man);
    }

    #[test]
    fn womens_labels_do_not_match_the_mens_token() {
        assert_eq!(infer_gender(&cats(&["Dresses"])), Gender::Woman);
        assert_eq!(infer_gender(&cats(&["Women's Dresses"])), Gender::Woman);
        assert_eq!(infer_gender(&[]), Gender::Woman);
    }

    #[test]
    fn collects_each_fabric_keyword_once() {
        assert_eq!(
            fabric_tags(&cats(&["Cashmere Sweater"])).as_deref(),
            Some(["cashmere".to_string()].as_slice())
        );
        assert_eq!(
            fabric_tags(&cats(&["Cashmere Jumpers", "Wool Cashmere Coats"])).as_deref(),
            Some(["cashmere".to_string(), "wool".to_string()].as_slice())
        );
    }

    #[test]
    fn no_keyword_means_absent_tags() {
        assert_eq!(fabric_tags(&cats(&["Dresses"])), None);
        assert_eq!(fabric_tags(&[]), None);
    }
}
