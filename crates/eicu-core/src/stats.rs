//! Summary statistics over dictionary frequencies.

use std::collections::BTreeMap;

use serde::Serialize;

use eicu_model::{CodeEntry, CodeType, DictionaryEntry};

/// Distribution of one frequency column over a set of codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyStats {
    pub code_num: usize,
    pub sum: u64,
    pub mean: f64,
    pub median: f64,
    pub max: u64,
    pub min: u64,
}

impl FrequencyStats {
    /// `None` for an empty set, so callers never divide by zero.
    pub fn from_frequencies(frequencies: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut values: Vec<u64> = frequencies.into_iter().collect();
        if values.is_empty() {
            return None;
        }
        values.sort_unstable();
        let code_num = values.len();
        let sum: u64 = values.iter().sum();
        let mid = code_num / 2;
        let median = if code_num % 2 == 0 {
            (values[mid - 1] as f64 + values[mid] as f64) / 2.0
        } else {
            values[mid] as f64
        };
        Some(Self {
            code_num,
            sum,
            mean: sum as f64 / code_num as f64,
            median,
            max: values[code_num - 1],
            min: values[0],
        })
    }
}

/// Per code type statistics of a per-table vocabulary.
pub fn stats_by_type(entries: &[CodeEntry]) -> BTreeMap<CodeType, FrequencyStats> {
    group_by_type(entries.iter().map(|e| (e.code_type, e.total_frequency)))
}

fn group_by_type(
    frequencies: impl Iterator<Item = (CodeType, u64)>,
) -> BTreeMap<CodeType, FrequencyStats> {
    let mut grouped: BTreeMap<CodeType, Vec<u64>> = BTreeMap::new();
    for (kind, total) in frequencies {
        grouped.entry(kind).or_default().push(total);
    }
    grouped
        .into_iter()
        .filter_map(|(kind, values)| {
            FrequencyStats::from_frequencies(values).map(|stats| (kind, stats))
        })
        .collect()
}

/// Statistics of the merged dictionary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictionaryStats {
    pub overall: Option<FrequencyStats>,
    pub by_type: BTreeMap<CodeType, FrequencyStats>,
    /// `value_frequency` of the valued codes.
    pub valued: Option<FrequencyStats>,
    /// Sum of `value_frequency` over every code.
    pub value_sum: u64,
    /// Mean of `value_frequency / total_frequency` over valued codes.
    pub mean_value_ratio: Option<f64>,
}

impl DictionaryStats {
    pub fn from_entries(entries: &[DictionaryEntry]) -> Self {
        let by_type = group_by_type(entries.iter().map(|e| (e.code_type, e.total_frequency)));

        let valued: Vec<&DictionaryEntry> = entries.iter().filter(|e| e.with_value).collect();
        let ratios: Vec<f64> = valued.iter().filter_map(|e| e.value_ratio()).collect();
        let mean_value_ratio = if ratios.is_empty() {
            None
        } else {
            Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
        };

        Self {
            overall: FrequencyStats::from_frequencies(entries.iter().map(|e| e.total_frequency)),
            by_type,
            valued: FrequencyStats::from_frequencies(valued.iter().map(|e| e.value_frequency)),
            value_sum: entries.iter().map(|e| e.value_frequency).sum(),
            mean_value_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_and_even_medians() {
        let odd = FrequencyStats::from_frequencies([5, 1, 3]).expect("stats");
        assert_eq!(odd.median, 3.0);
        assert_eq!(odd.sum, 9);
        assert_eq!((odd.min, odd.max), (1, 5));

        let even = FrequencyStats::from_frequencies([4, 1, 3, 2]).expect("stats");
        assert_eq!(even.median, 2.5);
        assert_eq!(even.mean, 2.5);
    }

    #[test]
    fn empty_set_has_no_stats() {
        assert_eq!(FrequencyStats::from_frequencies(std::iter::empty()), None);
    }

    #[test]
    fn valueless_dictionary_reports_no_valued_stats() {
        let entries = vec![
            DictionaryEntry::from_entry(1, {
                let mut entry = CodeEntry::new("sepsis", CodeType::Diagnosis);
                entry.total_frequency = 4;
                entry
            }),
        ];
        let stats = DictionaryStats::from_entries(&entries);
        assert_eq!(stats.valued, None);
        assert_eq!(stats.mean_value_ratio, None);
        assert_eq!(stats.value_sum, 0);
        assert_eq!(stats.overall.map(|s| s.sum), Some(4));
    }

    #[test]
    fn valued_stats_count_value_occurrences() {
        let entry = |index, code: &str, total, values| {
            let mut entry = CodeEntry::new(code, CodeType::Lab);
            entry.total_frequency = total;
            entry.value_frequency = values;
            entry.with_value = values > 0;
            DictionaryEntry::from_entry(index, entry)
        };
        let entries = vec![entry(1, "ph", 3, 0), entry(2, "glucose", 10, 4)];
        let stats = DictionaryStats::from_entries(&entries);
        let valued = stats.valued.expect("valued stats");
        assert_eq!(valued.code_num, 1);
        assert_eq!(valued.sum, 4);
        assert_eq!(stats.value_sum, 4);
        assert_eq!(stats.overall.map(|s| s.sum), Some(13));
        assert_eq!(stats.mean_value_ratio, Some(0.4));
    }
}
