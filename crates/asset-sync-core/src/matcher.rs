//! Filename heuristics for grouping version families ("Env.png", "Env_v2.png",
//! "Env copy.png") that do not share bytes.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::scanner::session::ScanSession;
use crate::storage::AssetStore;

/// Canonical names shorter than this are too ambiguous to match on.
pub const MIN_CANONICAL_LEN: usize = 3;

const SIBLING_QUERY_LIMIT: usize = 50;

lazy_static! {
    static ref LEADING_NUMBER: Regex = Regex::new(r"(?i)^\d+[._ -]+").unwrap();

    // Applied in order, once each per pass.
    static ref VERSION_SUFFIXES: Vec<Regex> = [
        r"(?i)[_ -]v\d+$",
        r"(?i)[_ -]ver\d+$",
        r"(?i)[_ -]version\s*\d+$",
        r"(?i)[_ -]copy(\s*\d+)?$",
        r"(?i)\s*\(\d+\)$",
        r"(?i)[_ -]final$",
        r"(?i)[_ -]robocze$",
        r"(?i)[_ -](work|working|backup|temp|old)$",
        r"(?i)[_ -]\d+$",
    ]
    .iter()
    .map(|re| Regex::new(re).unwrap())
    .collect();
}

/// Reduce a file name to its version-family key.
///
/// Lowercases, drops the extension, then strips leading numbering and version
/// suffixes until a full pass changes nothing.
pub fn canonical_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };
    let mut base = stem.to_lowercase();

    loop {
        let original = base.clone();
        base = LEADING_NUMBER.replace(&base, "").into_owned();

        for re in VERSION_SUFFIXES.iter() {
            let stripped = re.replace(&base, "");
            if stripped != base {
                base = stripped.into_owned();
            }
        }

        if base == original {
            break;
        }
        base = base.trim().to_string();
    }

    base
}

/// Look for an existing group that `file_name` belongs to by name alone.
///
/// The scan session is consulted first so siblings resolved earlier in the
/// same pass match before their rows are committed. On a miss the store is
/// asked for loosely matching names in the folder and every candidate is
/// re-canonicalized; candidates arrive in ascending id order so the oldest
/// verified sibling wins.
pub fn try_match(
    store: &dyn AssetStore,
    session: &ScanSession,
    folder_id: i64,
    file_name: &str,
) -> Option<String> {
    let base = canonical_name(file_name);
    if base.chars().count() < MIN_CANONICAL_LEN {
        debug!(file = file_name, base = %base, "Heuristic match skipped: base name too short");
        return None;
    }

    if let Some(group_id) = session.name_group(folder_id, &base) {
        debug!(file = file_name, base = %base, group_id = %group_id, "Heuristic match (session)");
        return Some(group_id);
    }

    // `%` and `_` inside the name only widen the filter; the exact canonical
    // comparison below keeps the result correct.
    let pattern = format!("%{}%", base);
    let candidates = match store.find_potential_siblings(folder_id, &pattern, SIBLING_QUERY_LIMIT)
    {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(file = file_name, "Heuristic sibling lookup failed: {}", e);
            return None;
        }
    };

    let matched = candidates
        .into_iter()
        .find(|cand| canonical_name(&cand.file_name) == base)
        .map(|cand| {
            debug!(
                file = file_name,
                matched_with = %cand.file_name,
                group_id = %cand.group_id,
                "Heuristic match (store)"
            );
            cand.group_id
        });

    if matched.is_none() {
        debug!(file = file_name, base = %base, "Heuristic match: none");
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        let cases = [
            ("Monster.png", "monster"),
            ("Monster_v1.png", "monster"),
            ("Monster-v2.jpg", "monster"),
            ("Hero_Character_final.obj", "hero_character"),
            ("Hero_Character_FINAL_v3.obj", "hero_character"),
            ("Weapon Sword copy.fbx", "weapon sword"),
            ("Weapon Sword copy 2.fbx", "weapon sword"),
            ("Texture (1).png", "texture"),
            ("Texture (2).jpg", "texture"),
            ("ork.blend1", "ork"),
            ("GNOM_001.zpr", "gnom"),
            ("Asset-02.obj", "asset"),
            ("ork_robocze_01.blend", "ork"),
            ("model_final_v2.obj", "model"),
            ("Scene_ver3.blend", "scene"),
            ("Scene_version 4.blend", "scene"),
            ("Rock_backup.psd", "rock"),
            ("7. Character-Sheet-Orc.jpg", "character-sheet-orc"),
            ("01_Background.png", "background"),
            ("version_control.txt", "version_control"),
            ("my_vacation.jpg", "my_vacation"),
            ("v2.png", "v2"),
        ];
        for (input, expected) in cases {
            assert_eq!(canonical_name(input), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_canonical_name_without_extension() {
        assert_eq!(canonical_name("Crate_v3"), "crate");
    }
}
