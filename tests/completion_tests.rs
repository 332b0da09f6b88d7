//! Integration tests for the completion engine: deferred recurrence,
//! occurrence spawning, and the subtree cascade.

use chrono::{TimeZone, Utc};
use taskdeck::db::Database;
use taskdeck::types::{NewTask, Recurrence, Task, TaskPatch, TaskTree};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn ms(y: i32, m: u32, d: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        .unwrap()
        .timestamp_millis()
}

fn task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        ..Default::default()
    }
}

fn all_tasks(db: &Database) -> Vec<Task> {
    fn flatten(forest: Vec<TaskTree>, out: &mut Vec<Task>) {
        for node in forest {
            out.push(node.task);
            flatten(node.children, out);
        }
    }

    let mut out = Vec::new();
    flatten(db.list_tree().expect("list_tree"), &mut out);
    out
}

fn refreshed(db: &Database, id: i64) -> Task {
    db.get_task(id).expect("get_task").expect("task exists")
}

mod deferral {
    use super::*;

    #[test]
    fn completing_recurring_child_defers_spawn() {
        let db = setup_db();
        let parent = db.create_task(task("weekly review")).unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                recurrence: Recurrence::Daily,
                due_date: Some(ms(2024, 1, 10)),
                ..task("water plants")
            })
            .unwrap();

        let updated = db.update_task(child.id, TaskPatch::completed(true)).unwrap();

        assert!(updated.completed);
        assert!(updated.pending_parent_completion);
        assert_eq!(updated.parent_id, Some(parent.id));
        // No new row: the spawn waits for the parent.
        assert_eq!(all_tasks(&db).len(), 2);
    }

    #[test]
    fn deferred_spawn_fires_when_parent_completes() {
        let db = setup_db();
        let parent = db.create_task(task("weekly review")).unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                recurrence: Recurrence::Daily,
                due_date: Some(ms(2024, 1, 10)),
                ..task("water plants")
            })
            .unwrap();
        db.update_task(child.id, TaskPatch::completed(true)).unwrap();

        db.update_task(parent.id, TaskPatch::completed(true)).unwrap();

        let child = refreshed(&db, child.id);
        assert!(child.completed);
        assert!(!child.pending_parent_completion);

        let tasks = all_tasks(&db);
        assert_eq!(tasks.len(), 3);
        let spawned: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.id != parent.id && t.id != child.id)
            .collect();
        assert_eq!(spawned.len(), 1);
        let spawned = spawned[0];
        assert_eq!(spawned.title, "water plants");
        assert_eq!(spawned.parent_id, None);
        assert_eq!(spawned.depth, 0);
        assert_eq!(spawned.due_date, Some(ms(2024, 1, 11)));
        assert!(!spawned.completed);
        assert_eq!(spawned.recurrence, Recurrence::Daily);
    }

    #[test]
    fn pending_marker_is_consumed_exactly_once() {
        let db = setup_db();
        let parent = db.create_task(task("checklist")).unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                recurrence: Recurrence::Daily,
                due_date: Some(ms(2024, 1, 10)),
                ..task("repeat me")
            })
            .unwrap();
        db.update_task(child.id, TaskPatch::completed(true)).unwrap();
        db.update_task(parent.id, TaskPatch::completed(true)).unwrap();

        // Reopening and re-completing the parent must not spawn again: the
        // child's marker was already consumed.
        db.update_task(parent.id, TaskPatch::completed(false)).unwrap();
        db.update_task(parent.id, TaskPatch::completed(true)).unwrap();

        assert_eq!(all_tasks(&db).len(), 3);
    }

    #[test]
    fn reopening_child_voids_pending_spawn() {
        let db = setup_db();
        let parent = db.create_task(task("parent")).unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                recurrence: Recurrence::Weekly,
                ..task("child")
            })
            .unwrap();
        db.update_task(child.id, TaskPatch::completed(true)).unwrap();
        assert!(refreshed(&db, child.id).pending_parent_completion);

        db.update_task(child.id, TaskPatch::completed(false)).unwrap();

        let child = refreshed(&db, child.id);
        assert!(!child.completed);
        assert!(!child.pending_parent_completion);
        // The voided marker produced no occurrence.
        assert_eq!(all_tasks(&db).len(), 2);
    }
}

mod spawning {
    use super::*;

    #[test]
    fn completing_recurring_root_spawns_immediately() {
        let db = setup_db();
        let root = db
            .create_task(NewTask {
                recurrence: Recurrence::Weekly,
                due_date: Some(ms(2024, 1, 1)),
                tags: vec!["errand".to_string(), "home".to_string()],
                ..task("take out recycling")
            })
            .unwrap();

        db.update_task(root.id, TaskPatch::completed(true)).unwrap();

        let tasks = all_tasks(&db);
        assert_eq!(tasks.len(), 2);
        let spawned = tasks.iter().find(|t| t.id != root.id).unwrap();
        assert_eq!(spawned.title, "take out recycling");
        assert_eq!(spawned.due_date, Some(ms(2024, 1, 8)));
        assert!(!spawned.completed);
        assert_eq!(spawned.parent_id, None);
        assert_eq!(spawned.position, root.position + 1);

        let mut tag_names: Vec<String> =
            spawned.tags.iter().map(|t| t.name.clone()).collect();
        tag_names.sort();
        assert_eq!(tag_names, vec!["errand", "home"]);

        // Links are duplicated, not moved.
        assert_eq!(refreshed(&db, root.id).tags.len(), 2);
    }

    #[test]
    fn spawn_without_due_date_anchors_to_now() {
        let db = setup_db();
        let before = Utc::now().timestamp_millis();
        let root = db
            .create_task(NewTask {
                recurrence: Recurrence::Daily,
                ..task("stretch")
            })
            .unwrap();

        db.update_task(root.id, TaskPatch::completed(true)).unwrap();

        let spawned = all_tasks(&db)
            .into_iter()
            .find(|t| t.id != root.id)
            .unwrap();
        let day_ms = 24 * 60 * 60 * 1000;
        let due = spawned.due_date.expect("spawned task has a due date");
        assert!(due >= before + day_ms);
        assert!(due <= Utc::now().timestamp_millis() + day_ms);
    }

    #[test]
    fn spawn_inherits_category_from_ancestors() {
        let db = setup_db();
        let category = db.create_category("Home", "#b48ead", None).unwrap();
        let grandparent = db
            .create_task(NewTask {
                category_id: Some(category.id),
                ..task("grandparent")
            })
            .unwrap();
        let parent = db
            .create_task(NewTask {
                parent_id: Some(grandparent.id),
                ..task("parent")
            })
            .unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                recurrence: Recurrence::Daily,
                due_date: Some(ms(2024, 1, 10)),
                ..task("child")
            })
            .unwrap();

        // Complete the child (defers), then the whole tree from the top.
        db.update_task(child.id, TaskPatch::completed(true)).unwrap();
        db.update_task(grandparent.id, TaskPatch::completed(true)).unwrap();

        let spawned = all_tasks(&db)
            .into_iter()
            .find(|t| t.parent_id.is_none() && t.id != grandparent.id)
            .unwrap();
        assert_eq!(spawned.category_id, Some(category.id));
    }

    #[test]
    fn spawn_prefers_own_category() {
        let db = setup_db();
        let inherited = db.create_category("Inherited", "#111111", None).unwrap();
        let own = db.create_category("Own", "#222222", None).unwrap();
        let parent = db
            .create_task(NewTask {
                category_id: Some(inherited.id),
                ..task("parent")
            })
            .unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                category_id: Some(own.id),
                recurrence: Recurrence::Daily,
                ..task("child")
            })
            .unwrap();

        db.update_task(child.id, TaskPatch::completed(true)).unwrap();
        db.update_task(parent.id, TaskPatch::completed(true)).unwrap();

        let spawned = all_tasks(&db)
            .into_iter()
            .find(|t| t.parent_id.is_none() && t.id != parent.id)
            .unwrap();
        assert_eq!(spawned.category_id, Some(own.id));
    }
}

mod cascade {
    use super::*;

    #[test]
    fn completing_parent_cascades_to_whole_subtree() {
        let db = setup_db();
        let parent = db.create_task(task("parent")).unwrap();
        let c1 = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                ..task("c1")
            })
            .unwrap();
        let c2 = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                ..task("c2")
            })
            .unwrap();
        let g1 = db
            .create_task(NewTask {
                parent_id: Some(c1.id),
                ..task("g1")
            })
            .unwrap();

        db.update_task(parent.id, TaskPatch::completed(true)).unwrap();

        for id in [parent.id, c1.id, c2.id, g1.id] {
            assert!(refreshed(&db, id).completed, "task {} not completed", id);
        }
    }

    #[test]
    fn unchecked_recurring_child_spawns_during_cascade() {
        let db = setup_db();
        let parent = db.create_task(task("parent")).unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                recurrence: Recurrence::Monthly,
                due_date: Some(ms(2024, 1, 31)),
                ..task("pay rent")
            })
            .unwrap();

        // The child was never individually checked off; forcing the parent
        // complete must still carry the child's recurrence forward.
        db.update_task(parent.id, TaskPatch::completed(true)).unwrap();

        let child = refreshed(&db, child.id);
        assert!(child.completed);
        assert!(!child.pending_parent_completion);

        let spawned = all_tasks(&db)
            .into_iter()
            .find(|t| t.id != parent.id && t.id != child.id)
            .expect("occurrence spawned for the unchecked recurring child");
        assert_eq!(spawned.title, "pay rent");
        assert_eq!(spawned.parent_id, None);
        // Monthly arithmetic clamps to the end of February.
        assert_eq!(spawned.due_date, Some(ms(2024, 2, 29)));
    }

    #[test]
    fn pending_grandchild_resolves_at_its_own_level() {
        let db = setup_db();
        let parent = db.create_task(task("parent")).unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                ..task("child")
            })
            .unwrap();
        let grandchild = db
            .create_task(NewTask {
                parent_id: Some(child.id),
                recurrence: Recurrence::Daily,
                due_date: Some(ms(2024, 1, 10)),
                ..task("grandchild")
            })
            .unwrap();

        // Complete the grandchild first: it defers against its own parent.
        db.update_task(grandchild.id, TaskPatch::completed(true)).unwrap();
        assert!(refreshed(&db, grandchild.id).pending_parent_completion);
        assert_eq!(all_tasks(&db).len(), 3);

        // A multi-level cascade from the root reaches the grandchild and
        // consumes its marker there.
        db.update_task(parent.id, TaskPatch::completed(true)).unwrap();

        let grandchild = refreshed(&db, grandchild.id);
        assert!(grandchild.completed);
        assert!(!grandchild.pending_parent_completion);
        assert!(refreshed(&db, child.id).completed);

        let spawned: Vec<Task> = all_tasks(&db)
            .into_iter()
            .filter(|t| {
                t.id != parent.id && t.id != child.id && t.id != grandchild.id
            })
            .collect();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].due_date, Some(ms(2024, 1, 11)));
    }

    #[test]
    fn reopening_parent_does_not_reopen_children() {
        let db = setup_db();
        let parent = db.create_task(task("parent")).unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                ..task("child")
            })
            .unwrap();
        db.update_task(parent.id, TaskPatch::completed(true)).unwrap();

        db.update_task(parent.id, TaskPatch::completed(false)).unwrap();

        assert!(!refreshed(&db, parent.id).completed);
        assert!(refreshed(&db, child.id).completed);
    }
}

mod no_op {
    use super::*;

    #[test]
    fn equal_completed_flag_performs_no_engine_work() {
        let db = setup_db();
        let parent = db.create_task(task("parent")).unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                recurrence: Recurrence::Daily,
                ..task("child")
            })
            .unwrap();

        // Setting completed=false on an incomplete parent must not cascade,
        // defer, or spawn anything.
        db.update_task(parent.id, TaskPatch::completed(false)).unwrap();

        let child = refreshed(&db, child.id);
        assert!(!child.completed);
        assert!(!child.pending_parent_completion);
        assert_eq!(all_tasks(&db).len(), 2);
    }

    #[test]
    fn non_completion_patches_do_not_touch_the_engine() {
        let db = setup_db();
        let parent = db.create_task(task("parent")).unwrap();
        let child = db
            .create_task(NewTask {
                parent_id: Some(parent.id),
                recurrence: Recurrence::Daily,
                ..task("child")
            })
            .unwrap();

        let patch = taskdeck::types::TaskPatch {
            title: Some("renamed".to_string()),
            ..Default::default()
        };
        db.update_task(parent.id, patch).unwrap();

        assert!(!refreshed(&db, child.id).completed);
        assert_eq!(all_tasks(&db).len(), 2);
    }

    #[test]
    fn re_completing_a_completed_task_spawns_nothing() {
        let db = setup_db();
        let root = db
            .create_task(NewTask {
                recurrence: Recurrence::Daily,
                due_date: Some(ms(2024, 1, 10)),
                ..task("root")
            })
            .unwrap();
        db.update_task(root.id, TaskPatch::completed(true)).unwrap();
        assert_eq!(all_tasks(&db).len(), 2);

        db.update_task(root.id, TaskPatch::completed(true)).unwrap();

        assert_eq!(all_tasks(&db).len(), 2);
    }
}
