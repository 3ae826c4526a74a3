use uuid::Uuid;

/// Generates a random lowercase base-32 identifier of exactly `length` characters.
///
/// Each random 128-bit block encodes to 26 characters of the Nix base-32 alphabet
/// (`0-9a-z` without `e`, `o`, `u`, `t`); lengths past that draw another block.
pub fn compact_identifier(length: usize) -> String {
    let mut identifier = String::with_capacity(length + 26);
    while identifier.len() < length {
        identifier.push_str(&nix_base32::to_nix_base32(Uuid::new_v4().as_bytes()));
    }
    identifier.truncate(length);

    identifier
}
