use crate::api::QueueStats;

/// Renders `stats` in the Prometheus text exposition format.
pub fn render_stats(stats: &QueueStats, namespace: &str) -> String {
    let ns = if namespace.is_empty() {
        "ladderq"
    } else {
        namespace
    };

    let mut out = String::new();
    out.push_str(&format!(
        "# HELP {ns}_pushed_total Total items pushed\n# TYPE {ns}_pushed_total counter\n{ns}_pushed_total {}\n",
        stats.pushed
    ));
    out.push_str(&format!(
        "# HELP {ns}_popped_total Total items popped\n# TYPE {ns}_popped_total counter\n{ns}_popped_total {}\n",
        stats.popped
    ));
    out.push_str(&format!(
        "# HELP {ns}_forced_promotions_total Pops redirected to the next priority by throttling\n# TYPE {ns}_forced_promotions_total counter\n{ns}_forced_promotions_total {}\n",
        stats.forced_promotions
    ));
    out.push_str(&format!(
        "# HELP {ns}_aging_runs_total Aging passes executed\n# TYPE {ns}_aging_runs_total counter\n{ns}_aging_runs_total {}\n",
        stats.aging_runs
    ));
    out.push_str(&format!(
        "# HELP {ns}_sweep_transitions_total Next-priority sweep toggles\n# TYPE {ns}_sweep_transitions_total counter\n{ns}_sweep_transitions_total{{state=\"on\"}} {}\n{ns}_sweep_transitions_total{{state=\"off\"}} {}\n",
        stats.sweep_activations, stats.sweep_deactivations
    ));
    out.push_str(&format!(
        "# HELP {ns}_len Items currently queued\n# TYPE {ns}_len gauge\n{ns}_len {}\n",
        stats.len
    ));
    out.push_str(&format!(
        "# HELP {ns}_capacity Maximum items queued\n# TYPE {ns}_capacity gauge\n{ns}_capacity {}\n",
        stats.capacity
    ));
    out.push_str(&format!(
        "# HELP {ns}_buckets Non-empty priority levels\n# TYPE {ns}_buckets gauge\n{ns}_buckets {}\n",
        stats.buckets
    ));
    out.push_str(&format!(
        "# HELP {ns}_sweep_active Whether a next-priority sweep is running\n# TYPE {ns}_sweep_active gauge\n{ns}_sweep_active {}\n",
        u8::from(stats.sweep_active)
    ));
    if stats.sweep_active {
        out.push_str(&format!(
            "# HELP {ns}_sweep_remaining Pops left in the running sweep\n# TYPE {ns}_sweep_remaining gauge\n{ns}_sweep_remaining {}\n",
            stats.sweep_remaining
        ));
    }

    out
}
