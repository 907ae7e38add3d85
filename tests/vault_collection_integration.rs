use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use vault_task_sync::task::TaskPatch;
use vault_task_sync::{FsVault, MemoryVault, TaskCollector, TaskFilter, VaultError};

const DAILY: &str = "# Thursday\n\
- [ ] Call mom 📅 2025-03-28\n\
- [x] Gym\n\
not a task\n  \
* [ ] Stretch (C) #health ⏳ 2025-03-29\n";

fn write(root: &std::path::Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_vault() -> TempDir {
    let dir = TempDir::new().expect("Should create temp vault");
    write(dir.path(), "Daily/2025-03-27.md", DAILY);
    write(dir.path(), "Projects/tasks/alpha.md", "- [ ] Ship alpha (A)\n");
    write(dir.path(), "My Tasks.md", "- [ ] Renew passport\n");
    write(dir.path(), "Reading.md", "- [ ] Finish novel\n");
    write(dir.path(), ".obsidian/tasks.md", "- [ ] Hidden\n");
    dir
}

#[tokio::test]
async fn test_collects_from_eligible_files_only() {
    let dir = sample_vault();
    let collector = TaskCollector::new(
        Arc::new(FsVault::new(dir.path())),
        TaskFilter::default(),
        &["Daily/**/*.md".to_string()],
    );

    let tasks = collector.collect_tasks().await.expect("Collection should succeed");
    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

    assert_eq!(
        ids,
        vec![
            "Daily/2025-03-27.md:2",
            "Daily/2025-03-27.md:5",
            "My Tasks.md:1",
            "Projects/tasks/alpha.md:1",
        ]
    );

    let stretch = &tasks[1];
    assert_eq!(stretch.description, "Stretch");
    assert_eq!(stretch.metadata.priority.as_deref(), Some("C"));
    assert_eq!(stretch.metadata.tags, vec!["health"]);
    assert_eq!(stretch.metadata.scheduled_date.as_deref(), Some("2025-03-29"));
    assert!(tasks.iter().all(|t| t.last_modified.is_some()));
}

#[tokio::test]
async fn test_completed_tasks_follow_filter() {
    let dir = sample_vault();
    let filter = TaskFilter {
        include_completed_tasks: true,
        ..Default::default()
    };
    let collector = TaskCollector::new(
        Arc::new(FsVault::new(dir.path())),
        filter,
        &["Daily/*.md".to_string()],
    );

    let tasks = collector.collect_tasks().await.unwrap();
    let gym = tasks
        .iter()
        .find(|t| t.description == "Gym")
        .expect("Completed task should be collected");
    assert!(gym.completed);
    assert_eq!(gym.id, "Daily/2025-03-27.md:3");
}

#[tokio::test]
async fn test_in_place_completion_keeps_rest_of_file() {
    let dir = sample_vault();
    let collector = TaskCollector::new(
        Arc::new(FsVault::new(dir.path())),
        TaskFilter::default(),
        &["Daily/**/*.md".to_string()],
    );
    let tasks = collector.collect_tasks().await.unwrap();

    collector
        .update_task_in_place(&tasks[0], &TaskPatch::completion(true))
        .await
        .expect("Update should succeed");

    let content = fs::read_to_string(dir.path().join("Daily/2025-03-27.md")).unwrap();
    assert_eq!(content, DAILY.replacen("- [ ] Call mom", "- [x] Call mom", 1));
}

#[tokio::test]
async fn test_in_place_rewrite_of_fields() {
    let dir = sample_vault();
    let collector = TaskCollector::new(
        Arc::new(FsVault::new(dir.path())),
        TaskFilter::default(),
        &["Daily/**/*.md".to_string()],
    );
    let tasks = collector.collect_tasks().await.unwrap();

    let patch = TaskPatch {
        due_date: Some("2025-04-01".to_string()),
        ..Default::default()
    };
    collector.update_task_in_place(&tasks[1], &patch).await.unwrap();

    let reloaded = collector.collect_tasks().await.unwrap();
    let stretch = reloaded
        .iter()
        .find(|t| t.id == "Daily/2025-03-27.md:5")
        .expect("Task should stay on its line");
    assert_eq!(stretch.description, "Stretch");
    assert_eq!(stretch.metadata.due_date.as_deref(), Some("2025-04-01"));
    assert_eq!(stretch.metadata.scheduled_date.as_deref(), Some("2025-03-29"));
    assert!(stretch.raw_content.starts_with("  * [ ] "));
}

#[tokio::test]
async fn test_update_of_stale_line_is_rejected() {
    let dir = sample_vault();
    let collector = TaskCollector::new(
        Arc::new(FsVault::new(dir.path())),
        TaskFilter::default(),
        &["Daily/**/*.md".to_string()],
    );
    let tasks = collector.collect_tasks().await.unwrap();

    write(dir.path(), "Daily/2025-03-27.md", "# Thursday\nplain text now\n");
    let result = collector
        .update_task_in_place(&tasks[0], &TaskPatch::completion(true))
        .await;
    assert!(matches!(result, Err(VaultError::NotATask { line: 2, .. })));
}

#[tokio::test]
async fn test_precomputed_index_matches_parsing() {
    let files = [
        ("Tasks.md", "- [ ] One (A)\n- [x] Two\n- [ ] Three #x 📅 2025-01-01\n"),
        ("Work/tasks.md", "intro\n- [ ] Four\n"),
    ];

    let indexed = Arc::new(MemoryVault::new());
    indexed.insert_indexed(files[0].0, files[0].1, None).await;
    indexed.insert(files[1].0, files[1].1, None).await;

    let parsed = Arc::new(MemoryVault::new());
    for (path, content) in files {
        parsed.insert(path, content, None).await;
    }

    let patterns = ["**/*.md".to_string()];
    let from_index = TaskCollector::new(indexed, TaskFilter::default(), &patterns)
        .collect_tasks()
        .await
        .unwrap();
    let from_parse = TaskCollector::new(parsed, TaskFilter::default(), &patterns)
        .collect_tasks()
        .await
        .unwrap();

    assert_eq!(from_index.len(), 3);
    assert_eq!(from_index[0].raw_content, "- [ ] One (A)");
    let summary = |tasks: &[vault_task_sync::CanonicalTask]| {
        tasks
            .iter()
            .map(|t| {
                (
                    t.id.clone(),
                    t.raw_content.clone(),
                    t.description.clone(),
                    t.metadata.clone(),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&from_index), summary(&from_parse));
}

#[tokio::test]
async fn test_field_rewrite_preserves_annotations() {
    let dir = TempDir::new().unwrap();
    let original = "# Work\n\
- [ ] Write proposal [#Work Tasks] [@mornings] due:2025-03-30 1h30m\n\
- [ ] Other ⏳ 2025-03-29\n";
    write(dir.path(), "Work/tasks.md", original);

    let collector = TaskCollector::new(
        Arc::new(FsVault::new(dir.path())),
        TaskFilter::default(),
        &[],
    );
    let tasks = collector.collect_tasks().await.unwrap();
    assert_eq!(tasks[0].id, "Work/tasks.md:2");

    let patch = TaskPatch {
        description: Some("Final proposal".to_string()),
        due_date: Some("2025-04-01".to_string()),
        ..Default::default()
    };
    collector
        .update_task_in_place(&tasks[0], &patch)
        .await
        .expect("Update should succeed");

    let content = fs::read_to_string(dir.path().join("Work/tasks.md")).unwrap();
    assert_eq!(
        content,
        original.replacen(
            "Write proposal [#Work Tasks] [@mornings] due:2025-03-30",
            "Final proposal [#Work Tasks] [@mornings] due:2025-04-01",
            1
        )
    );
}
