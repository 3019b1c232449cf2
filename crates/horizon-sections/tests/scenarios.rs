//! End-to-end scenarios: a controller bound to a `MemoryStore`, driven both
//! through the controller facade and by editing the store directly.

use std::sync::{Arc, Weak};

use chrono::{DateTime, TimeZone, Utc};
use horizon_sections::controller::{
    ChangeEvent, ControllerConfig, ControllerObserver, FetchOptions, ObserverCall,
    RecordingObserver, SectionsController,
};
use horizon_sections::source::memory::{EntityDescription, MemoryStore, ObjectId};
use horizon_sections::source::{Attributes, ObjectSource, Predicate, SortDescriptor};
use horizon_sections::{AttributeValue, ChangeKind, ControllerError, IndexPath, SourceError};
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("horizon_sections=debug")
        .with_test_writer()
        .try_init();
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2012, 6, d, 9, 30, 0).unwrap()
}

fn path(section: usize, row: usize) -> Option<IndexPath> {
    Some(IndexPath::new(section, row))
}

// ============================================================================
// Calendar: date sections, store-driven batches
// ============================================================================

struct Calendar {
    store: Arc<MemoryStore>,
    controller: Arc<SectionsController<MemoryStore>>,
    observer: Arc<RecordingObserver<ObjectId>>,
}

impl Calendar {
    fn new() -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        store.define_entity(EntityDescription::new("Event").attribute("day").attribute("title"));

        let calendar = Self {
            controller: Arc::new(
                SectionsController::new(
                    store.clone(),
                    ControllerConfig::query("Event")
                        .sort_by(SortDescriptor::ascending("day"))
                        .sort_by(SortDescriptor::ascending("title"))
                        .section_key_path("day"),
                )
                .unwrap(),
            ),
            observer: Arc::new(RecordingObserver::new()),
            store,
        };
        assert!(calendar.controller.observe_source());
        calendar.controller.set_observer(&calendar.observer);
        calendar
    }

    fn add(&self, title: &str, on: DateTime<Utc>) -> ObjectId {
        let event = self.store.insert("Event").unwrap();
        self.store.set_attribute_value(&event, "day", on.into()).unwrap();
        self.store.set_attribute_value(&event, "title", title.into()).unwrap();
        event
    }
}

#[test]
fn test_calendar_sections_by_day() {
    let calendar = Calendar::new();
    let standup = calendar.add("standup", day(26));
    let review = calendar.add("review", day(26));
    let retro = calendar.add("retro", day(27));
    calendar.store.process_pending_changes();

    assert_eq!(
        calendar.controller.section_titles(),
        vec![Some("Jun 26, 2012".to_string()), Some("Jun 27, 2012".to_string())]
    );
    assert_eq!(calendar.controller.objects_in_section(0).unwrap(), vec![review, standup]);
    assert_eq!(calendar.controller.objects_in_section(1).unwrap(), vec![retro]);

    // The store-driven batch inserted both sections and all three rows.
    let events = calendar.observer.events();
    assert_eq!(
        &events[..2],
        &[
            ChangeEvent::section(ChangeKind::Insert, 0),
            ChangeEvent::section(ChangeKind::Insert, 1),
        ]
    );
    assert_eq!(events.iter().filter(|e| e.kind == ChangeKind::Insert).count(), 5);
    assert_eq!(calendar.observer.batch_count(), 1);
}

#[test]
fn test_calendar_reschedule_moves_between_days() {
    let calendar = Calendar::new();
    let standup = calendar.add("standup", day(26));
    let review = calendar.add("review", day(26));
    let retro = calendar.add("retro", day(27));
    calendar.store.process_pending_changes();
    calendar.observer.take();

    calendar.store.set_attribute_value(&standup, "day", day(27).into()).unwrap();
    calendar.store.process_pending_changes();

    assert_eq!(calendar.controller.objects_in_section(0).unwrap(), vec![review]);
    assert_eq!(calendar.controller.objects_in_section(1).unwrap(), vec![retro, standup]);
    assert_eq!(
        calendar.observer.take(),
        vec![
            ObserverCall::WillChange,
            ObserverCall::Event(ChangeEvent::object(
                ChangeKind::Move,
                standup,
                path(0, 1),
                path(1, 1),
            )),
            ObserverCall::DidChange,
        ]
    );
}

#[test]
fn test_calendar_new_day_appends_section() {
    let calendar = Calendar::new();
    calendar.add("standup", day(26));
    calendar.store.process_pending_changes();
    calendar.observer.take();

    let demo = calendar.add("demo", day(28));
    calendar.store.process_pending_changes();

    assert_eq!(
        calendar.observer.events(),
        vec![
            ChangeEvent::section(ChangeKind::Insert, 1),
            ChangeEvent::object(ChangeKind::Insert, demo, None, path(1, 0)),
        ]
    );
    assert_eq!(calendar.controller.title_for_section(1).unwrap().as_deref(), Some("Jun 28, 2012"));
}

#[test]
fn test_calendar_batch_groups_store_changes() {
    let calendar = Calendar::new();
    let standup = calendar.add("standup", day(26));
    let retro = calendar.add("retro", day(27));
    calendar.store.process_pending_changes();
    calendar.observer.take();

    // Store notifications that arrive inside an open batch join it.
    calendar.controller.begin_changes().unwrap();
    calendar.store.remove(&standup).unwrap();
    calendar.store.process_pending_changes();
    calendar.store.set_attribute_value(&retro, "title", "retrospective".into()).unwrap();
    calendar.store.process_pending_changes();
    assert_eq!(calendar.controller.object_count(), 2);
    calendar.controller.end_changes().unwrap();

    assert_eq!(
        calendar.observer.take(),
        vec![
            ObserverCall::WillChange,
            ObserverCall::Event(ChangeEvent::section(ChangeKind::Delete, 0)),
            ObserverCall::Event(ChangeEvent::object(ChangeKind::Delete, standup, path(0, 0), None)),
            ObserverCall::Event(ChangeEvent::object(ChangeKind::Move, retro, path(1, 0), path(0, 0))),
            ObserverCall::DidChange,
        ]
    );
}

/// Reads the controller from inside its callbacks.
struct Mirror {
    controller: Mutex<Weak<SectionsController<MemoryStore>>>,
    seen: Mutex<Vec<(usize, usize)>>,
}

impl ControllerObserver<ObjectId> for Mirror {
    fn did_change_content(&self) {
        if let Some(controller) = self.controller.lock().upgrade() {
            self.seen
                .lock()
                .push((controller.section_count(), controller.object_count()));
        }
    }
}

#[test]
fn test_observer_reads_new_presentation() {
    let calendar = Calendar::new();
    let mirror = Arc::new(Mirror {
        controller: Mutex::new(Arc::downgrade(&calendar.controller)),
        seen: Mutex::new(Vec::new()),
    });
    calendar.controller.set_observer(&mirror);

    calendar.add("standup", day(26));
    calendar.add("retro", day(27));
    calendar.store.process_pending_changes();

    assert_eq!(*mirror.seen.lock(), vec![(2, 2)]);
}

// ============================================================================
// Folders: relationship binding with an inverse
// ============================================================================

struct Notes {
    store: Arc<MemoryStore>,
    folder: ObjectId,
    first: ObjectId,
    stray: ObjectId,
}

fn notes() -> Notes {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    store.define_entity(
        EntityDescription::new("Folder")
            .attribute("name")
            .to_many("notes", "Note", None),
    );
    store.define_entity(
        EntityDescription::new("Note")
            .attribute("title")
            .to_one("folder", "Folder", Some("notes")),
    );

    let folder = store.insert("Folder").unwrap();
    let first = store.insert("Note").unwrap();
    store.set_attribute_value(&first, "title", "a".into()).unwrap();
    store.relate(&first, "folder", &folder).unwrap();

    // Reachable from the folder, but never wired back through `folder`.
    let stray = store.insert("Note").unwrap();
    store.set_attribute_value(&stray, "title", "0".into()).unwrap();
    store.relate(&folder, "notes", &stray).unwrap();
    store.save().unwrap();

    Notes {
        store,
        folder,
        first,
        stray,
    }
}

fn folder_controller(notes: &Notes) -> Arc<SectionsController<MemoryStore>> {
    let config = ControllerConfig::relationship("notes")
        .root(notes.folder)
        .inverse("folder")
        .sort_by(SortDescriptor::ascending("title"));
    let controller = Arc::new(SectionsController::new(notes.store.clone(), config).unwrap());
    controller.observe_source();
    controller
}

#[test]
fn test_relationship_members_must_point_back() {
    let notes = notes();
    assert_eq!(notes.store.related_objects(&notes.folder, "notes").len(), 2);

    let controller = folder_controller(&notes);
    assert_eq!(controller.entity(), "Note");
    assert_eq!(controller.all_objects(), vec![notes.first]);
    assert!(controller.index_path_of(&notes.stray).is_err());
    assert_eq!(controller.title_for_section(0).unwrap(), None);
}

#[test]
fn test_relationship_create_wires_inverse() {
    let notes = notes();
    let controller = folder_controller(&notes);
    let observer = Arc::new(RecordingObserver::new());
    controller.set_observer(&observer);

    let second = controller.create_object().unwrap();
    notes.store.set_attribute_value(&second, "title", "b".into()).unwrap();
    assert_eq!(notes.store.related_objects(&second, "folder"), vec![notes.folder]);
    assert!(notes.store.related_objects(&notes.folder, "notes").contains(&second));

    controller.commit().unwrap();
    assert_eq!(controller.all_objects(), vec![notes.first, second]);
    assert_eq!(
        observer.events(),
        vec![ChangeEvent::object(ChangeKind::Insert, second, None, path(0, 1))]
    );
}

#[test]
fn test_relationship_root_removed() {
    let notes = notes();
    let controller = folder_controller(&notes);
    let observer = Arc::new(RecordingObserver::new());
    controller.set_observer(&observer);

    notes.store.remove(&notes.folder).unwrap();
    notes.store.process_pending_changes();

    assert_eq!(controller.object_count(), 0);
    assert_eq!(controller.section_count(), 1);
    assert_eq!(
        observer.events(),
        vec![ChangeEvent::object(ChangeKind::Delete, notes.first, path(0, 0), None)]
    );
}

#[test]
fn test_relationship_configuration_errors() {
    let notes = notes();
    let no_root = ControllerConfig::<ObjectId>::relationship("notes");
    assert!(matches!(
        SectionsController::new(notes.store.clone(), no_root),
        Err(ControllerError::Configuration(_))
    ));

    let wrong_inverse = ControllerConfig::relationship("notes")
        .root(notes.folder)
        .inverse("title");
    assert!(matches!(
        SectionsController::new(notes.store.clone(), wrong_inverse),
        Err(ControllerError::Configuration(_))
    ));

    let wrong_entity = ControllerConfig::relationship("notes")
        .root(notes.folder)
        .entity("Folder");
    assert!(matches!(
        SectionsController::new(notes.store.clone(), wrong_entity),
        Err(ControllerError::Configuration(_))
    ));
}

// ============================================================================
// To-do lists: options from TOML, manual ordering, commits
// ============================================================================

const TODO_OPTIONS: &str = r#"
section_key_path = "list"
contiguity_check = "always"

[[sort_descriptors]]
key_path = "list"

[[sort_descriptors]]
key_path = "position"
kind = "manual"
"#;

struct Todo {
    store: Arc<MemoryStore>,
    controller: Arc<SectionsController<MemoryStore>>,
    observer: Arc<RecordingObserver<ObjectId>>,
    dishes: ObjectId,
    laundry: ObjectId,
    email: ObjectId,
}

fn todo() -> Todo {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    store.define_entity(
        EntityDescription::new("Task")
            .attribute("list")
            .attribute("position")
            .attribute("title")
            .attribute("done"),
    );
    let task = |list: &str, position: i64, title: &str| {
        let task = store.insert("Task").unwrap();
        store.set_attribute_value(&task, "list", list.into()).unwrap();
        store.set_attribute_value(&task, "position", position.into()).unwrap();
        store.set_attribute_value(&task, "title", title.into()).unwrap();
        task
    };
    let dishes = task("home", 0, "dishes");
    let laundry = task("home", 1, "laundry");
    let email = task("work", 2, "email");
    store.save().unwrap();

    let options = FetchOptions::from_toml_str(TODO_OPTIONS).unwrap();
    let controller = Arc::new(
        SectionsController::new(store.clone(), ControllerConfig::query("Task").options(options))
            .unwrap(),
    );
    controller.observe_source();
    let observer = Arc::new(RecordingObserver::new());
    controller.set_observer(&observer);

    Todo {
        store,
        controller,
        observer,
        dishes,
        laundry,
        email,
    }
}

#[test]
fn test_todo_options_from_toml() {
    let todo = todo();
    assert!(todo.controller.is_reorderable());
    assert_eq!(
        todo.controller.section_titles(),
        vec![Some("home".to_string()), Some("work".to_string())]
    );
    let groups = todo.controller.sections_by_key();
    assert_eq!(groups["home"], vec![todo.dishes, todo.laundry]);
    assert_eq!(groups["work"], vec![todo.email]);
}

#[test]
fn test_todo_move_to_other_list() {
    let todo = todo();
    todo.controller
        .move_object(&todo.laundry, IndexPath::new(0, 1), IndexPath::new(1, 0))
        .unwrap();

    assert_eq!(
        todo.store.attribute_value(&todo.laundry, "list"),
        Some(AttributeValue::from("work"))
    );
    assert_eq!(todo.controller.objects_in_section(1).unwrap(), vec![todo.laundry, todo.email]);
    assert_eq!(
        todo.observer.events(),
        vec![
            ChangeEvent::object(ChangeKind::Move, todo.laundry, path(0, 1), path(1, 0)),
            ChangeEvent::object(ChangeKind::Move, todo.email, path(1, 0), path(1, 1)),
        ]
    );

    todo.controller.commit().unwrap();
    assert_eq!(todo.store.save_count(), 2);
    assert!(!todo.store.has_changes());
}

#[test]
fn test_todo_moves_inside_a_batch_report_once() {
    let todo = todo();
    todo.controller
        .perform_batch(|controller| {
            controller.move_object(&todo.email, IndexPath::new(1, 0), IndexPath::new(0, 0))?;
            // Paths still address the presentation from before the batch.
            controller.move_object(&todo.dishes, IndexPath::new(0, 0), IndexPath::new(0, 1))
        })
        .unwrap();

    assert_eq!(todo.observer.batch_count(), 1);
    assert_eq!(todo.controller.section_count(), 1);
    assert_eq!(todo.controller.all_objects(), vec![todo.laundry, todo.dishes, todo.email]);
}

#[test]
fn test_todo_commit_failure_keeps_presentation() {
    let todo = todo();
    todo.store.set_attribute_value(&todo.email, "done", true.into()).unwrap();
    todo.store.fail_next_save("disk full");

    let err = todo.controller.commit().unwrap_err();
    assert!(matches!(err, ControllerError::Persistence(SourceError::SaveRejected(_))));
    assert!(todo.store.has_changes());
    assert_eq!(todo.controller.all_objects(), vec![todo.dishes, todo.laundry, todo.email]);
    assert_eq!(
        todo.observer.calls(),
        vec![ObserverCall::WillChange, ObserverCall::DidChange]
    );

    // The retry saves and reports the touched task in place.
    todo.controller.commit().unwrap();
    assert_eq!(
        todo.observer.events(),
        vec![ChangeEvent::object(ChangeKind::Update, todo.email, path(1, 0), path(1, 0))]
    );
}

#[test]
fn test_todo_filtered_by_predicate() {
    let todo = todo();
    todo.store.set_attribute_value(&todo.laundry, "done", true.into()).unwrap();
    todo.store.save().unwrap();

    let options = FetchOptions::from_json_str(
        r#"{"section_key_path": "list", "sort_descriptors": [{"key_path": "list"}, {"key_path": "title"}]}"#,
    )
    .unwrap();
    let open = ControllerConfig::query("Task")
        .options(options)
        .predicate(Predicate::new("not done", |attrs| {
            attrs.value("done") != Some(AttributeValue::from(true))
        }));
    let controller = SectionsController::new(todo.store.clone(), open).unwrap();

    assert!(!controller.is_reorderable());
    assert_eq!(controller.all_objects(), vec![todo.dishes, todo.email]);
    assert!(matches!(
        controller.move_object(&todo.dishes, IndexPath::new(0, 0), IndexPath::new(1, 0)),
        Err(ControllerError::UnsupportedOperation(_))
    ));
}
