//! 工位占用冲突检测
//!
//! 纯函数，无副作用，每次合并/渲染时全量重算，冲突从不落入任务状态。

use std::collections::{BTreeMap, BTreeSet};

use crate::entities::ScheduledTask;

/// 一对冲突任务，task_id 升序存放，保证对称去重
pub type ConflictPair = (String, String);

/// 找出所有在同一工位上时间区间重叠的任务对。
///
/// 按工位分组，组内按（开始时间, task_id）排序后扫描，
/// 维护仍未结束的任务集合；每个新任务与所有仍活跃的前驱
/// 两两成对，因此三重及以上的部分重叠也能完整报出。
/// 每个工位 O(n log n)。
pub fn detect_conflicts<'a, I>(tasks: I) -> BTreeSet<ConflictPair>
where
    I: IntoIterator<Item = &'a ScheduledTask>,
{
    let mut by_workstation: BTreeMap<&str, Vec<&ScheduledTask>> = BTreeMap::new();
    for task in tasks {
        by_workstation
            .entry(task.workstation_id.as_str())
            .or_default()
            .push(task);
    }

    let mut pairs = BTreeSet::new();
    for group in by_workstation.values_mut() {
        group.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });

        let mut active: Vec<&ScheduledTask> = Vec::new();
        for task in group.iter().copied() {
            // 区间为 [start, end)：end == start 的前驱已经让出工位
            active.retain(|prev| prev.end_time() > task.start_time);
            for prev in &active {
                pairs.insert(ordered_pair(&prev.task_id, &task.task_id));
            }
            active.push(task);
        }
    }
    pairs
}

/// 冲突对中涉及的任务 ID 集合，供展示层标注单个任务
pub fn conflicted_task_ids(pairs: &BTreeSet<ConflictPair>) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for (a, b) in pairs {
        ids.insert(a.clone());
        ids.insert(b.clone());
    }
    ids
}

fn ordered_pair(a: &str, b: &str) -> ConflictPair {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
