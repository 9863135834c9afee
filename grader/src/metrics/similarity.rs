//! Fuzzy string matching used when comparing diagram components.

/// Groups of names treated as the same concept across English and Vietnamese.
const VARIANT_GROUPS: &[&[&str]] = &[
    &["user", "nguoi dung", "người dùng"],
    &["admin", "quan tri", "quản trị"],
    &["student", "hoc sinh", "học sinh", "sinh vien", "sinh viên"],
    &["teacher", "giao vien", "giáo viên"],
    &["login", "dang nhap", "đăng nhập"],
    &["logout", "dang xuat", "đăng xuất"],
    &["manage", "quan ly", "quản lý"],
    &["create", "tao", "tạo"],
    &["delete", "xoa", "xóa"],
    &["update", "cap nhat", "cập nhật"],
];

/// Boost applied when two strings are known variants of each other.
const VARIANT_BOOST: f64 = 0.2;

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Whether both (already normalized) strings belong to the same variant group.
pub fn are_variants(a: &str, b: &str) -> bool {
    VARIANT_GROUPS
        .iter()
        .any(|group| group.contains(&a) && group.contains(&b))
}

/// Similarity of two component names in `[0, 1]`.
///
/// Exact matches after trimming and lowercasing score `1.0`. Otherwise the
/// normalized Levenshtein ratio is used, raised by `0.2` (capped at `1.0`)
/// for known bilingual variants.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    if a == b {
        return 1.0;
    }

    let ratio = strsim::normalized_levenshtein(&a, &b);
    if are_variants(&a, &b) {
        (ratio + VARIANT_BOOST).min(1.0)
    } else {
        ratio
    }
}

/// Greedy one-to-one matching of expected items against actual items.
///
/// For each expected item in order, the unused actual item with the highest
/// similarity at or above `threshold` is taken. Ties keep the first actual item
/// encountered. Matched actual items are not reused.
///
/// # Returns
///
/// `(expected, actual)` pairs, in expected order.
pub fn semantic_match(expected: &[String], actual: &[String], threshold: f64) -> Vec<(String, String)> {
    let mut used = vec![false; actual.len()];
    let mut pairs = Vec::new();

    for exp in expected {
        let mut best: Option<(usize, f64)> = None;
        for (index, act) in actual.iter().enumerate() {
            if used[index] {
                continue;
            }
            let score = similarity(exp, act);
            if score >= threshold && best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }

        if let Some((index, _)) = best {
            used[index] = true;
            pairs.push((exp.clone(), actual[index].clone()));
        }
    }

    pairs
}
