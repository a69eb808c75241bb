//! Seeded response corpora and partition helpers

use consultatie::ResponseRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};

const VOCABULARY: &[&str] = &[
    "wij", "zijn", "tegen", "voor", "het", "voorstel", "de", "minister", "wet", "windpark", "kust", "natuur",
    "vogels", "geluid", "bewoners", "energie", "kosten", "parkeren", "binnenstad", "fiets", "veiligheid",
    "school", "kinderen", "zorg", "regels", "vergunning", "boeren", "stikstof", "water", "huur",
];

fn random_sentence(rng: &mut StdRng, words: usize) -> Vec<String> {
    (0..words)
        .map(|_| VOCABULARY.choose(rng).copied().unwrap_or("en").to_string())
        .collect()
}

/// Copy of `template` with a few words swapped out
fn mutate(rng: &mut StdRng, template: &[String], edits: usize) -> String {
    let mut words = template.to_vec();
    for _ in 0..edits {
        let at = rng.gen_range(0..words.len());
        words[at] = VOCABULARY.choose(rng).copied().unwrap_or("en").to_string();
    }
    words.join(" ")
}

/// Responses for one consultation: a few campaign templates with light
/// edits, independent submissions, and the odd blank response
pub fn campaign_corpus(seed: u64, slug: &str, size: usize) -> Vec<ResponseRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let templates: Vec<Vec<String>> = (0..3).map(|_| random_sentence(&mut rng, 30)).collect();

    (0..size)
        .map(|i| {
            let id = format!("r{:04}", i);
            let text = match rng.gen_range(0..10) {
                0 => String::new(),
                1..=5 => {
                    let template = &templates[rng.gen_range(0..templates.len())];
                    let edits = rng.gen_range(0..6);
                    mutate(&mut rng, template, edits)
                }
                _ => {
                    let length = rng.gen_range(5..40);
                    random_sentence(&mut rng, length).join(" ")
                }
            };
            ResponseRecord::new(slug, id, text)
        })
        .collect()
}

/// Grouping of response ids by component label; labels themselves dropped
pub fn partition(records: &[ResponseRecord]) -> BTreeSet<BTreeSet<String>> {
    let mut groups: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
    for record in records {
        if let Some(label) = record.component {
            groups.entry(label).or_default().insert(record.response_id.clone());
        }
    }
    groups.into_values().collect()
}

/// Whether every group of `fine` lies inside some group of `coarse`
pub fn refines(fine: &BTreeSet<BTreeSet<String>>, coarse: &BTreeSet<BTreeSet<String>>) -> bool {
    fine.iter()
        .all(|group| coarse.iter().any(|outer| group.is_subset(outer)))
}
