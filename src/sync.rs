use std::collections::HashSet;

use crate::error::SyncError;
use crate::integrations::habitica::{HabiticaClient, HabiticaTodo, NewTodo};
use crate::integrations::rtm::{RtmClient, RtmTask};

/// Alias sets fetched from Habitica; the alias is the sole join key between
/// the two services. To-dos without an alias were not created by this tool
/// and are ignored.
#[derive(Debug, Default)]
pub struct AliasSets {
    pub open: HashSet<String>,
    pub completed: HashSet<String>,
}

impl AliasSets {
    pub fn from_todos(open: &[HabiticaTodo], completed: &[HabiticaTodo]) -> Self {
        Self {
            open: collect_aliases(open),
            completed: collect_aliases(completed),
        }
    }

    fn known(&self, alias: &str) -> bool {
        self.open.contains(alias) || self.completed.contains(alias)
    }
}

fn collect_aliases(todos: &[HabiticaTodo]) -> HashSet<String> {
    todos.iter().filter_map(|todo| todo.alias.clone()).collect()
}

/// Queued actions, computed before anything is mutated. Actions are keyed by
/// alias and independent of each other, so ordering never changes the end
/// state.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub complete_on_rtm: Vec<RtmTask>,
    pub create_on_habitica: Vec<NewTodo>,
    pub score_on_habitica: Vec<RtmTask>,
}

pub fn build_plan(
    open_tasks: &[RtmTask],
    closed_tasks: &[RtmTask],
    aliases: &AliasSets,
) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for task in open_tasks {
        if aliases.completed.contains(&task.task_id) {
            plan.complete_on_rtm.push(task.clone());
        } else if !aliases.known(&task.task_id) {
            plan.create_on_habitica
                .push(NewTodo::todo(&task.name, &task.task_id, task.due.clone()));
        }
        // Open on both sides: already in sync.
    }

    for task in closed_tasks {
        // Score only what Habitica still considers open; an alias already in
        // the completed set has been scored before, and re-scoring is not
        // idempotent.
        if aliases.open.contains(&task.task_id) && !aliases.completed.contains(&task.task_id) {
            plan.score_on_habitica.push(task.clone());
        }
    }

    plan
}

#[derive(Debug, Default, PartialEq)]
pub struct SyncReport {
    pub completed_on_rtm: usize,
    pub scored_on_habitica: usize,
    pub created: usize,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "{} imported, {} checked off on RTM, {} scored on Habitica",
            self.created, self.completed_on_rtm, self.scored_on_habitica
        )
    }
}

/// Executes the queued actions: per-task completions on each side, then one
/// batch create. Fail-fast on the first HTTP error; calls already issued are
/// not undone.
pub fn apply_plan(
    plan: &SyncPlan,
    rtm: &RtmClient,
    timeline: &str,
    habitica: &HabiticaClient,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    for task in &plan.complete_on_rtm {
        rtm.complete_task(timeline, task)?;
        println!("› Checked off completed Habitica to-do \"{}\" on Remember The Milk", task.name);
        report.completed_on_rtm += 1;
    }

    for task in &plan.score_on_habitica {
        habitica.score_up(&task.task_id)?;
        println!("› Checked off completed Remember The Milk task \"{}\" on Habitica", task.name);
        report.scored_on_habitica += 1;
    }

    if !plan.create_on_habitica.is_empty() {
        habitica.create_todos(&plan.create_on_habitica)?;
        report.created = plan.create_on_habitica.len();
        println!("› Imported {} task(s) from Remember The Milk into Habitica", report.created);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rtm_task(id: &str, name: &str, due: Option<&str>) -> RtmTask {
        RtmTask {
            list_id: format!("l-{id}"),
            series_id: format!("s-{id}"),
            task_id: id.to_string(),
            name: name.to_string(),
            due: due.map(str::to_string),
        }
    }

    fn todo(id: &str, text: &str, alias: Option<&str>) -> HabiticaTodo {
        HabiticaTodo {
            id: id.to_string(),
            text: text.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    fn sets(open: &[&str], completed: &[&str]) -> AliasSets {
        AliasSets {
            open: open.iter().map(|s| s.to_string()).collect(),
            completed: completed.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn matching_open_task_needs_no_action() {
        let open = vec![rtm_task("rtm-1", "Buy milk", None)];
        let plan = build_plan(&open, &[], &sets(&["rtm-1"], &[]));
        assert!(plan.complete_on_rtm.is_empty());
        assert!(plan.create_on_habitica.is_empty());
        assert!(plan.score_on_habitica.is_empty());
    }

    #[test]
    fn unknown_open_task_queues_one_creation() {
        let open = vec![rtm_task("rtm-2", "Call bank", Some("2024-01-01"))];
        let plan = build_plan(&open, &[], &sets(&["rtm-1"], &[]));
        assert_eq!(
            plan.create_on_habitica,
            vec![NewTodo::todo("Call bank", "rtm-2", Some("2024-01-01".to_string()))]
        );
    }

    #[test]
    fn habitica_completed_task_queues_rtm_completion() {
        let open = vec![rtm_task("rtm-3", "Water plants", None)];
        let plan = build_plan(&open, &[], &sets(&[], &["rtm-3"]));
        assert_eq!(plan.complete_on_rtm.len(), 1);
        let handle = &plan.complete_on_rtm[0];
        assert_eq!(handle.list_id, "l-rtm-3");
        assert_eq!(handle.series_id, "s-rtm-3");
        assert_eq!(handle.task_id, "rtm-3");
        assert!(plan.create_on_habitica.is_empty());
    }

    #[test]
    fn rtm_closed_task_queues_one_score_up() {
        let closed = vec![rtm_task("rtm-4", "Take out trash", None)];
        let plan = build_plan(&[], &closed, &sets(&["rtm-4"], &[]));
        assert_eq!(plan.score_on_habitica.len(), 1);
        assert_eq!(plan.score_on_habitica[0].task_id, "rtm-4");
    }

    #[test]
    fn already_scored_alias_is_not_scored_again() {
        // Alias present in both sets: a previous run already scored it.
        let closed = vec![rtm_task("rtm-4", "Take out trash", None)];
        let plan = build_plan(&[], &closed, &sets(&["rtm-4"], &["rtm-4"]));
        assert!(plan.score_on_habitica.is_empty());
    }

    #[test]
    fn closed_task_unknown_to_habitica_is_ignored() {
        let closed = vec![rtm_task("rtm-9", "Never synced", None)];
        let plan = build_plan(&[], &closed, &sets(&["rtm-1"], &[]));
        assert!(plan.score_on_habitica.is_empty());
        assert!(plan.create_on_habitica.is_empty());
    }

    #[test]
    fn creation_is_idempotent_across_runs() {
        let open = vec![rtm_task("rtm-2", "Call bank", None)];
        let first = build_plan(&open, &[], &sets(&[], &[]));
        assert_eq!(first.create_on_habitica.len(), 1);

        // Second run: the alias now exists on Habitica.
        let second = build_plan(&open, &[], &sets(&["rtm-2"], &[]));
        assert!(second.create_on_habitica.is_empty());
    }

    #[test]
    fn each_candidate_appears_exactly_once() {
        let open = vec![
            rtm_task("rtm-1", "In sync", None),
            rtm_task("rtm-2", "New", None),
            rtm_task("rtm-3", "Done on Habitica", None),
        ];
        let closed = vec![rtm_task("rtm-4", "Done on RTM", None)];
        let aliases = sets(&["rtm-1", "rtm-4"], &["rtm-3"]);

        let plan = build_plan(&open, &closed, &aliases);
        assert_eq!(plan.create_on_habitica.len(), 1);
        assert_eq!(plan.create_on_habitica[0].alias, "rtm-2");
        assert_eq!(plan.complete_on_rtm.len(), 1);
        assert_eq!(plan.complete_on_rtm[0].task_id, "rtm-3");
        assert_eq!(plan.score_on_habitica.len(), 1);
        assert_eq!(plan.score_on_habitica[0].task_id, "rtm-4");
    }

    #[test]
    fn alias_sets_skip_todos_without_alias() {
        let open = vec![
            todo("h-1", "Synced", Some("rtm-1")),
            todo("h-2", "Created in Habitica", None),
        ];
        let completed = vec![todo("h-3", "Done", Some("rtm-3"))];
        let aliases = AliasSets::from_todos(&open, &completed);
        assert_eq!(aliases.open.len(), 1);
        assert!(aliases.open.contains("rtm-1"));
        assert!(aliases.completed.contains("rtm-3"));
    }

    #[test]
    fn report_summary_counts_all_directions() {
        let report = SyncReport {
            completed_on_rtm: 2,
            scored_on_habitica: 1,
            created: 3,
        };
        assert_eq!(report.summary(), "3 imported, 2 checked off on RTM, 1 scored on Habitica");
    }
}
