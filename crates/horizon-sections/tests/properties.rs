//! Property tests for sectioning, index mapping and change batches.
//!
//! The batch property replays the emitted events the way a table view would
//! (removals at old paths, then insertions at new paths) and checks that the
//! replay lands exactly on the controller's new presentation. The manual order
//! property does the same for interleaved moves, inserts and deletes.

use std::collections::HashSet;
use std::sync::Arc;

use horizon_sections::controller::{
    contiguity_violations, flatten, ChangeEvent, ControllerConfig, IndexMapper, ObserverCall,
    RecordingObserver, Section, SectionsController, Sectioner,
};
use horizon_sections::source::memory::{EntityDescription, MemoryStore, ObjectId};
use horizon_sections::source::{FetchRequest, ObjectSource, SortDescriptor};
use horizon_sections::{AttributeValue, ChangeKind, IndexPath};
use proptest::prelude::*;

// ============================================================================
// Sectioner
// ============================================================================

proptest! {
    #[test]
    fn prop_sections_partition_sorted_input(mut keys in prop::collection::vec(0i64..6, 0..40)) {
        keys.sort_unstable();
        let objects: Vec<(i64, usize)> = keys.iter().copied().zip(0..).collect();
        let display = |value: &AttributeValue| value.to_string();

        let sections = Sectioner::new(Some("key"), &display)
            .compute(objects.clone(), |object, _| Some(AttributeValue::from(object.0)));

        prop_assert_eq!(flatten(&sections), objects);
        prop_assert!(contiguity_violations(&sections).is_empty());
        prop_assert!(sections.iter().all(|section| !section.is_empty()));
        let distinct: HashSet<i64> = keys.iter().copied().collect();
        prop_assert_eq!(sections.len(), distinct.len());
    }

    #[test]
    fn prop_mapper_is_a_bijection(sizes in prop::collection::vec(0usize..5, 1..6)) {
        let mut next = 0u32;
        let sections = sizes
            .iter()
            .map(|size| {
                let objects: Vec<u32> = (next..next + *size as u32).collect();
                next += *size as u32;
                Section::new(None, None, objects)
            })
            .collect();
        let mapper = IndexMapper::new(sections);

        prop_assert_eq!(mapper.object_count(), sizes.iter().sum::<usize>());
        for (path, object) in mapper.iter() {
            prop_assert_eq!(mapper.index_path(object).unwrap(), path);
            prop_assert_eq!(mapper.object_at(path).unwrap(), object);
        }
        prop_assert!(mapper.index_path(&next).is_err());
    }
}

// ============================================================================
// Batches
// ============================================================================

#[derive(Debug, Clone)]
enum Edit {
    Insert { group: i64 },
    Delete { pick: usize },
    Regroup { pick: usize, group: i64 },
    Touch { pick: usize },
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0i64..4).prop_map(|group| Edit::Insert { group }),
        any::<usize>().prop_map(|pick| Edit::Delete { pick }),
        (any::<usize>(), 0i64..4).prop_map(|(pick, group)| Edit::Regroup { pick, group }),
        any::<usize>().prop_map(|pick| Edit::Touch { pick }),
    ]
}

struct Harness {
    store: Arc<MemoryStore>,
    names: usize,
}

impl Harness {
    fn new(groups: &[i64]) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.define_entity(EntityDescription::new("Row").attribute("group").attribute("name"));
        let mut harness = Self { store, names: 0 };
        for group in groups {
            harness.insert(*group);
        }
        harness.store.save().unwrap();
        harness
    }

    fn insert(&mut self, group: i64) {
        let row = self.store.insert("Row").unwrap();
        self.store.set_attribute_value(&row, "group", group.into()).unwrap();
        self.store
            .set_attribute_value(&row, "name", format!("{:04}", self.names).into())
            .unwrap();
        self.names += 1;
    }

    fn controller(&self) -> Arc<SectionsController<MemoryStore>> {
        let config = ControllerConfig::query("Row")
            .sort_by(SortDescriptor::ascending("group"))
            .sort_by(SortDescriptor::ascending("name"))
            .section_key_path("group");
        Arc::new(SectionsController::new(self.store.clone(), config).unwrap())
    }

    fn apply(&mut self, edit: &Edit, live: &[ObjectId]) {
        let pick = |n: usize| live.get(n % live.len().max(1)).copied();
        match *edit {
            Edit::Insert { group } => self.insert(group),
            Edit::Delete { pick: n } => {
                if let Some(row) = pick(n) {
                    self.store.remove(&row).unwrap();
                }
            }
            Edit::Regroup { pick: n, group } => {
                if let Some(row) = pick(n) {
                    self.store.set_attribute_value(&row, "group", group.into()).unwrap();
                }
            }
            Edit::Touch { pick: n } => {
                if let Some(row) = pick(n) {
                    let name = self.store.attribute_value(&row, "name").unwrap();
                    self.store.set_attribute_value(&row, "name", name).unwrap();
                }
            }
        }
    }
}

/// Applies `events` to `before` with table-view batch semantics.
fn replay(before: &IndexMapper<ObjectId>, events: &[ChangeEvent<ObjectId>]) -> Vec<Vec<ObjectId>> {
    let removed_rows: HashSet<IndexPath> = events
        .iter()
        .filter(|e| matches!(e.kind, ChangeKind::Delete | ChangeKind::Move))
        .filter_map(|e| e.index_path)
        .collect();
    let removed_sections: HashSet<usize> = events
        .iter()
        .filter(|e| e.is_section_event() && e.kind == ChangeKind::Delete)
        .filter_map(|e| e.section_index)
        .collect();

    let mut sections: Vec<Vec<ObjectId>> = before
        .sections()
        .iter()
        .enumerate()
        .filter(|(s, _)| !removed_sections.contains(s))
        .map(|(s, section)| {
            section
                .objects()
                .iter()
                .enumerate()
                .filter(|(r, _)| !removed_rows.contains(&IndexPath::new(s, *r)))
                .map(|(_, object)| *object)
                .collect()
        })
        .collect();

    let mut inserted_sections: Vec<usize> = events
        .iter()
        .filter(|e| e.is_section_event() && e.kind == ChangeKind::Insert)
        .filter_map(|e| e.section_index)
        .collect();
    inserted_sections.sort_unstable();
    for index in inserted_sections {
        sections.insert(index, Vec::new());
    }

    let mut inserted_rows: Vec<(IndexPath, ObjectId)> = events
        .iter()
        .filter(|e| matches!(e.kind, ChangeKind::Insert | ChangeKind::Move))
        .filter_map(|e| Some((e.new_index_path?, e.object?)))
        .collect();
    inserted_rows.sort_unstable_by_key(|(path, _)| *path);
    for (path, object) in inserted_rows {
        sections[path.section()].insert(path.row(), object);
    }
    sections
}

fn layout(mapper: &IndexMapper<ObjectId>) -> Vec<Vec<ObjectId>> {
    mapper
        .sections()
        .iter()
        .map(|section| section.objects().to_vec())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_batch_events_replay_to_new_presentation(
        groups in prop::collection::vec(0i64..4, 0..10),
        edits in prop::collection::vec(edit(), 1..8),
    ) {
        let mut harness = Harness::new(&groups);
        let controller = harness.controller();
        controller.observe_source();
        let observer = Arc::new(RecordingObserver::new());
        controller.set_observer(&observer);

        let before = controller.snapshot();
        for edit in &edits {
            let live = harness.store.fetch(&FetchRequest::entity("Row")).unwrap();
            harness.apply(edit, &live);
        }
        controller.refresh().unwrap();
        let after = controller.snapshot();

        // Exactly one bracketed batch.
        let calls = observer.calls();
        prop_assert_eq!(calls.first(), Some(&ObserverCall::WillChange));
        prop_assert_eq!(calls.last(), Some(&ObserverCall::DidChange));
        prop_assert_eq!(observer.batch_count(), 1);

        let events = observer.events();
        prop_assert_eq!(replay(&before, &events), layout(&after));

        // Section events precede object events.
        let first_object = events.iter().position(|e| !e.is_section_event()).unwrap_or(events.len());
        prop_assert!(events[first_object..].iter().all(|e| !e.is_section_event()));

        // Updates are reported in place and only for unmoved objects.
        for event in events.iter().filter(|e| e.kind == ChangeKind::Update) {
            prop_assert_eq!(event.index_path, event.new_index_path);
        }

        // The presentation matches a controller built from scratch.
        let fresh = harness.controller();
        prop_assert_eq!(layout(&fresh.snapshot()), layout(&after));
        for (path, object) in after.iter() {
            prop_assert_eq!(controller.index_path_of(object).unwrap(), path);
        }
    }
}

// ============================================================================
// Manual order
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Insert { group: i64 },
    Delete { pick: usize },
    Move { pick: usize, section: usize, row: usize },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => (0i64..3).prop_map(|group| Step::Insert { group }),
        1 => any::<usize>().prop_map(|pick| Step::Delete { pick }),
        3 => (any::<usize>(), any::<usize>(), any::<usize>())
            .prop_map(|(pick, section, row)| Step::Move { pick, section, row }),
    ]
}

struct Board {
    store: Arc<MemoryStore>,
    appended: i64,
}

impl Board {
    fn new(groups: &[i64]) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.define_entity(EntityDescription::new("Card").attribute("group").attribute("position"));
        let mut board = Self { store, appended: 0 };
        for group in groups {
            board.insert(*group);
        }
        board.store.save().unwrap();
        board
    }

    fn insert(&mut self, group: i64) {
        let card = self.store.insert("Card").unwrap();
        self.store.set_attribute_value(&card, "group", group.into()).unwrap();
        self.store
            .set_attribute_value(&card, "position", (1000 + self.appended).into())
            .unwrap();
        self.appended += 1;
    }

    fn controller(&self) -> Arc<SectionsController<MemoryStore>> {
        let config = ControllerConfig::query("Card")
            .sort_by(SortDescriptor::ascending("group"))
            .sort_by(SortDescriptor::manual("position"))
            .section_key_path("group");
        Arc::new(SectionsController::new(self.store.clone(), config).unwrap())
    }

    /// Runs `step` as its own batch. For a move, returns the card with the
    /// paths it was moved from and to.
    fn apply(
        &mut self,
        step: &Step,
        controller: &SectionsController<MemoryStore>,
    ) -> Option<(ObjectId, IndexPath, IndexPath)> {
        let snapshot = controller.snapshot();
        let presented: Vec<(IndexPath, ObjectId)> =
            snapshot.iter().map(|(path, card)| (path, *card)).collect();
        if presented.is_empty() && !matches!(step, Step::Insert { .. }) {
            controller.refresh().unwrap();
            return None;
        }
        let pick = |n: usize| presented[n % presented.len()];
        match *step {
            Step::Insert { group } => {
                self.insert(group);
                controller.refresh().unwrap();
                None
            }
            Step::Delete { pick: n } => {
                controller.delete(&pick(n).1).unwrap();
                None
            }
            Step::Move { pick: n, section, row } => {
                let (from, card) = pick(n);
                let section = section % snapshot.sections().len();
                let mut room = snapshot.sections()[section].len();
                if section == from.section() {
                    room -= 1;
                }
                let to = IndexPath::new(section, row % (room + 1));
                controller.move_object(&card, from, to).unwrap();
                Some((card, from, to))
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_manual_moves_replay_to_new_presentation(
        groups in prop::collection::vec(0i64..3, 1..10),
        steps in prop::collection::vec(step(), 1..10),
    ) {
        let mut board = Board::new(&groups);
        let controller = board.controller();
        controller.observe_source();
        prop_assert!(controller.is_reorderable());
        let observer = Arc::new(RecordingObserver::new());
        controller.set_observer(&observer);

        for step in &steps {
            let before = controller.snapshot();
            let landed = board.apply(step, &controller);
            let after = controller.snapshot();

            let calls = observer.take();
            prop_assert_eq!(calls.first(), Some(&ObserverCall::WillChange));
            prop_assert_eq!(calls.last(), Some(&ObserverCall::DidChange));
            let events: Vec<ChangeEvent<ObjectId>> = calls
                .into_iter()
                .filter_map(|call| match call {
                    ObserverCall::Event(event) => Some(event),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(replay(&before, &events), layout(&after));

            if let Some((card, from, to)) = landed {
                // Emptying an earlier section shifts the destination up.
                let emptied = from.section() < to.section()
                    && before.sections()[from.section()].len() == 1;
                let expected = if emptied {
                    IndexPath::new(to.section() - 1, to.row())
                } else {
                    to
                };
                prop_assert_eq!(controller.index_path_of(&card).unwrap(), expected);
            }

            let fresh = board.controller();
            prop_assert_eq!(layout(&fresh.snapshot()), layout(&after));
            for (path, object) in after.iter() {
                prop_assert_eq!(controller.index_path_of(object).unwrap(), path);
            }
        }
        prop_assert!(contiguity_violations(controller.snapshot().sections()).is_empty());
    }
}
