use crate::types::{DuplicateRole, DuplicateStatus, NormalizedPhone, RegistrationRecord};
use std::collections::HashMap;
use tracing::info;

/// Records sharing one normalized phone number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// 1-based, in order of first appearance
    pub id: usize,
    pub key: NormalizedPhone,
    /// Row number of the first occurrence
    pub primary: usize,
    /// Row numbers of later occurrences, in input order
    pub secondary: Vec<usize>,
}

impl DuplicateGroup {
    pub fn has_duplicates(&self) -> bool {
        !self.secondary.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.primary).chain(self.secondary.iter().copied())
    }
}

/// Read-only grouping built once per run
#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    groups: Vec<DuplicateGroup>,
    statuses: HashMap<usize, DuplicateStatus>,
}

impl DuplicateIndex {
    /// Status for a row; rows that were never indexed are unique and ungrouped
    pub fn status(&self, row_number: usize) -> DuplicateStatus {
        self.statuses
            .get(&row_number)
            .copied()
            .unwrap_or_else(|| DuplicateStatus::unique(None))
    }

    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    /// Groups with more than one member
    pub fn duplicate_groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.iter().filter(|g| g.has_duplicates())
    }

    /// Number of secondary records across all groups
    pub fn secondary_count(&self) -> usize {
        self.groups.iter().map(|g| g.secondary.len()).sum()
    }
}

/// Group records by digits-only phone. Input order decides the primary.
pub fn detect_duplicates<'a, I>(records: I) -> DuplicateIndex
where
    I: IntoIterator<Item = &'a RegistrationRecord>,
{
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut by_key: HashMap<NormalizedPhone, usize> = HashMap::new();
    let mut ungrouped = Vec::new();

    for record in records {
        let Some(key) = NormalizedPhone::from_raw(&record.phone) else {
            ungrouped.push(record.row_number);
            continue;
        };
        match by_key.get(&key) {
            Some(&idx) => groups[idx].secondary.push(record.row_number),
            None => {
                by_key.insert(key.clone(), groups.len());
                groups.push(DuplicateGroup {
                    id: groups.len() + 1,
                    key,
                    primary: record.row_number,
                    secondary: Vec::new(),
                });
            }
        }
    }

    let mut statuses = HashMap::new();
    for row_number in ungrouped {
        statuses.insert(row_number, DuplicateStatus::unique(None));
    }
    for group in &groups {
        if !group.has_duplicates() {
            statuses.insert(group.primary, DuplicateStatus::unique(Some(group.id)));
            continue;
        }
        for (position, row_number) in group.members().enumerate() {
            let role = if position == 0 {
                DuplicateRole::Primary
            } else {
                DuplicateRole::Secondary
            };
            statuses.insert(
                row_number,
                DuplicateStatus {
                    role,
                    group_id: Some(group.id),
                    position: position + 1,
                },
            );
        }
    }

    let index = DuplicateIndex { groups, statuses };
    info!(
        "Found {} duplicate entries across {} phone numbers",
        index.secondary_count(),
        index.duplicate_groups().count()
    );
    index
}
