//! `ctpack resolve`: look hashes up without scanning anything.

use crate::error::{ErrorKind, Result};
use ctpack_identity::{ContentHash, Resolution, Resolver};
use std::io::Write;

pub fn run(resolver: &Resolver, inputs: &[String]) -> Result<()> {
    let hashes = inputs
        .iter()
        .map(|input| input.trim().parse::<ContentHash>().map_err(|_| exn::Exn::from(ErrorKind::InvalidHash(input.clone()))))
        .collect::<Result<Vec<_>>>()?;
    let mut stdout = std::io::stdout().lock();
    for hash in &hashes {
        // A closed stdout (`| head`) isn't worth reporting.
        if writeln!(stdout, "{}", describe(hash, &resolver.resolve(hash))).is_err() {
            break;
        }
    }
    Ok(())
}

/// One tab-separated line per hash: the hash, how it resolved, and the
/// record's id, category and name.
pub fn describe(hash: &ContentHash, resolution: &Resolution<'_>) -> String {
    match resolution {
        Resolution::Known { hash: canonical, record } if canonical == hash => {
            format!("{hash}\tknown\t{}\t{}\t{}", record.id, record.category, record.name)
        },
        Resolution::Known { hash: canonical, record } => {
            format!("{hash}\talias of {canonical}\t{}\t{}\t{}", record.id, record.category, record.name)
        },
        Resolution::Overridden(record) => {
            format!("{hash}\toverride\t{}\t{}\t{}", record.id, record.category, record.name)
        },
        Resolution::Unresolved => format!("{hash}\tunresolved"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctpack_identity::{Category, TrackRecord};
    use rstest::rstest;

    fn h(n: u8) -> ContentHash {
        ContentHash::from_bytes([n; ContentHash::LEN])
    }

    #[rstest]
    #[case(h(1), "known\t3054\trace\tSky Garden")]
    #[case(h(2), &format!("alias of {}\t3054\trace\tSky Garden", h(1)))]
    fn test_describe_known(#[case] input: ContentHash, #[case] expected: &str) {
        let record = TrackRecord::new("3054", "Sky Garden", Category::Race, 8);
        let resolution = Resolution::Known { hash: h(1), record: &record };
        assert_eq!(describe(&input, &resolution), format!("{input}\t{expected}"));
    }

    #[test]
    fn test_describe_override_and_unresolved() {
        let record = TrackRecord::new(h(3).to_hex(), "Star Slope", Category::Battle, 0);
        assert_eq!(
            describe(&h(3), &Resolution::Overridden(&record)),
            format!("{0}\toverride\t{0}\tbattle\tStar Slope", h(3))
        );
        assert_eq!(describe(&h(4), &Resolution::Unresolved), format!("{}\tunresolved", h(4)));
    }

    #[test]
    fn test_rejects_malformed_hashes() {
        let resolver = Resolver::new(Default::default(), Default::default(), Default::default());
        let err = run(&resolver, &["not-a-hash".to_string()]).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidHash("not-a-hash".to_string()));
    }
}
