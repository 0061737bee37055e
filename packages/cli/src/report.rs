//! Terminal output for plans and failure records.

use std::collections::BTreeMap;

use bucket_mirror::Plan;
use bucket_mirror::failure_record::FailureLog;

/// Prints per-partition pending and chunk counts.
pub fn print_plan(plan: &Plan) {
    println!(
        "{} local partition(s), {} remote partition(s)",
        plan.local_partitions, plan.remote_partitions
    );
    if !plan.partitions.remote_only.is_empty() {
        println!(
            "Remote only (left alone): {}",
            plan.partitions
                .remote_only
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    if plan.pending.is_empty() {
        println!("Mirror is up to date.");
        return;
    }

    let chunks_per_partition = chunk_counts(plan);
    println!("{:<12} {:>10} {:>8}", "PARTITION", "PENDING", "CHUNKS");
    println!("{}", "-".repeat(32));
    for (partition, files) in plan.pending.iter() {
        println!(
            "{partition:<12} {:>10} {:>8}",
            files.len(),
            chunks_per_partition.get(partition).copied().unwrap_or(0)
        );
    }
    println!("{}", "-".repeat(32));
    println!(
        "{:<12} {:>10} {:>8}",
        "TOTAL",
        plan.pending.total_files(),
        plan.chunks.len()
    );
}

/// Prints failure counts per partition.
pub fn print_failures(log: &FailureLog) {
    if log.entries.is_empty() {
        println!("No failed uploads recorded.");
    } else {
        println!("{:<12} {:>8} LAST FAILURE", "PARTITION", "FAILED");
        println!("{}", "-".repeat(50));
        for (partition, (count, last)) in summarize_failures(log) {
            println!("{partition:<12} {count:>8} {last}");
        }
        println!("{} failed upload(s) recorded", log.entries.len());
    }
    if log.malformed > 0 {
        println!("{} malformed line(s) skipped", log.malformed);
    }
}

fn chunk_counts(plan: &Plan) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for chunk in &plan.chunks {
        *counts.entry(chunk.partition.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Partition -> (failure count, last timestamp seen in file order).
fn summarize_failures(log: &FailureLog) -> BTreeMap<&str, (usize, &str)> {
    let mut summary: BTreeMap<&str, (usize, &str)> = BTreeMap::new();
    for entry in &log.entries {
        let slot = summary
            .entry(entry.partition.as_str())
            .or_insert((0, entry.timestamp.as_str()));
        slot.0 += 1;
        slot.1 = entry.timestamp.as_str();
    }
    summary
}

#[cfg(test)]
mod tests {
    use bucket_mirror::models::FailureEntry;

    use super::*;

    fn entry(partition: &str, file_name: &str, timestamp: &str) -> FailureEntry {
        FailureEntry {
            partition: partition.to_string(),
            file_name: file_name.to_string(),
            timestamp: timestamp.to_string(),
        }
    }

    #[test]
    fn failures_group_by_partition() {
        let log = FailureLog {
            entries: vec![
                entry("2019", "a.csv", "2021-05-07 10:00:00.000000"),
                entry("2020", "b.csv", "2021-05-07 10:00:01.000000"),
                entry("2019", "c.csv", "2021-05-07 10:00:02.000000"),
            ],
            malformed: 0,
        };

        let summary = summarize_failures(&log);

        assert_eq!(summary["2019"], (2, "2021-05-07 10:00:02.000000"));
        assert_eq!(summary["2020"], (1, "2021-05-07 10:00:01.000000"));
    }
}
