use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use strsim::damerau_levenshtein;
use unicode_normalization::UnicodeNormalization;

/// Synonym groups: tokens within one group are treated as interchangeable
/// during scoring. Expansion is symmetric and transitive inside a group and
/// never crosses group boundaries.
static SYNONYM_GROUPS: &[&[&str]] = &[
    &["javascript", "js", "node.js", "nodejs", "react", "angular", "vue"],
    &["python", "django", "flask", "fastapi", "pandas", "numpy"],
    &["java", "spring", "hibernate", "maven", "gradle"],
    &["sql", "mysql", "postgresql", "sqlite", "oracle", "mongodb"],
    &["aws", "amazon web services", "ec2", "s3", "lambda", "cloudformation"],
    &["docker", "containerization", "kubernetes", "k8s"],
    &[
        "machine learning",
        "ml",
        "ai",
        "artificial intelligence",
        "deep learning",
        "tensorflow",
        "pytorch",
    ],
    &["frontend", "front-end", "ui", "ux", "css", "html", "sass", "less"],
    &["backend", "back-end", "server-side", "api", "microservices"],
    &["devops", "ci/cd", "jenkins", "gitlab", "github actions", "terraform"],
];

/// Token -> group index, keyed on the exact normalized form (O(1) lookup).
static TOKEN_TO_GROUP: LazyLock<HashMap<&'static str, usize>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (idx, group) in SYNONYM_GROUPS.iter().enumerate() {
        for token in *group {
            map.insert(*token, idx);
        }
    }
    map
});

/// Same mapping keyed on separator-stripped compact forms, to absorb minor
/// notation differences ("node js", "CI-CD", "K8S").
static COMPACT_TO_GROUP: LazyLock<HashMap<String, usize>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (token, idx) in TOKEN_TO_GROUP.iter() {
        map.entry(compact_key(token)).or_insert(*idx);
    }
    map
});

fn nfkc_lower_trim(input: &str) -> String {
    input.nfkc().collect::<String>().trim().to_lowercase()
}

fn compact_key(input: &str) -> String {
    input
        .nfkc()
        .collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-' | '_' | '/' | ','))
        .collect()
}

fn fuzzy_group(compact: &str) -> Option<usize> {
    // Short tokens (js, ai, k8s, ...) are only matched exactly; fuzzing them
    // produces false positives on brief or ambiguous inputs.
    if compact.len() < 5 {
        return None;
    }

    let mut best: Option<(usize, usize)> = None;
    for (alias, idx) in COMPACT_TO_GROUP.iter() {
        if alias.len() < 5 {
            continue;
        }

        let distance = damerau_levenshtein(compact, alias);
        if distance == 0 {
            return Some(*idx);
        }

        let len = compact.len().max(alias.len());
        let acceptable = distance == 1 || (len >= 8 && distance == 2);
        if !acceptable {
            continue;
        }

        match best {
            None => best = Some((*idx, distance)),
            Some((_, best_dist)) if distance < best_dist => best = Some((*idx, distance)),
            _ => {}
        }
    }

    best.map(|(idx, _)| idx)
}

/// Resolve a single normalized token to its synonym group, if any.
fn lookup_group(token: &str) -> Option<usize> {
    if token.is_empty() {
        return None;
    }

    if let Some(idx) = TOKEN_TO_GROUP.get(token) {
        return Some(*idx);
    }

    let compact = compact_key(token);
    if let Some(idx) = COMPACT_TO_GROUP.get(&compact) {
        return Some(*idx);
    }

    fuzzy_group(&compact)
}

/// Normalize a single raw skill string (NFKC, lowercase, trimmed).
pub fn normalize_skill(skill: &str) -> String {
    nfkc_lower_trim(skill)
}

/// Normalize a skill list into a lower-cased set without synonym expansion.
pub fn normalize_skill_set(skills: &[String]) -> HashSet<String> {
    skills
        .iter()
        .map(|s| nfkc_lower_trim(s))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Expand a skill list through the synonym table: each recognized token pulls
/// in every member of its group. Unrecognized tokens pass through lower-cased.
/// Deterministic and pure.
pub fn expand_skills(skills: &[String]) -> HashSet<String> {
    let mut expanded = HashSet::new();

    for raw in skills {
        let token = nfkc_lower_trim(raw);
        if token.is_empty() {
            continue;
        }

        if let Some(idx) = lookup_group(&token) {
            for member in SYNONYM_GROUPS[idx] {
                expanded.insert((*member).to_string());
            }
        }
        expanded.insert(token);
    }

    expanded
}
