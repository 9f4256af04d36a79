use randcheck_core::{GeneratorKind, RunConfig, TestId};

/// One row per test: id, name, partitions and init outcome under the default
/// configuration.
pub fn test_rows(cfg: &RunConfig) -> Vec<(TestId, usize, Option<String>)> {
    TestId::ALL
        .iter()
        .map(|&id| {
            let mut driver = randcheck_tests::driver_for(id);
            match driver.init(cfg) {
                Ok(()) => {
                    let desc = driver.descriptor();
                    (id, desc.partitions, desc.disabled_reason.clone())
                }
                Err(e) => (id, 0, Some(e.to_string())),
            }
        })
        .collect()
}

pub fn run() {
    let cfg = RunConfig::default();
    println!("Tests (n = {} defaults):\n", cfg.sequence_length);
    println!("  {:>3}  {:<26} {:>10}", "ID", "NAME", "PARTITIONS");
    for (id, partitions, reason) in test_rows(&cfg) {
        match reason {
            None => println!("  {:>3}  {:<26} {:>10}", id.number(), id.name(), partitions),
            Some(r) => println!("  {:>3}  {:<26} {:>10}  ({r})", id.number(), id.name(), "-"),
        }
    }

    println!("\nBuiltin generators (--generator):\n");
    for kind in GeneratorKind::ALL {
        println!("  {:<8} {}", kind.name(), kind.description());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_cover_every_test() {
        let rows = test_rows(&RunConfig::default());
        assert_eq!(rows.len(), 15);
        let nonoverlapping = rows
            .iter()
            .find(|(id, ..)| *id == TestId::NonOverlappingTemplate)
            .unwrap();
        assert_eq!(nonoverlapping.1, 148);
        assert!(rows.iter().all(|(_, _, reason)| reason.is_none()));
    }
}
