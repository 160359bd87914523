use rand::Rng;
use reserva_core::RandomFormat;

/// Draws one value by sampling every position of the format independently.
pub fn sample<R: Rng>(format: &RandomFormat, rng: &mut R) -> String {
    format
        .classes()
        .iter()
        .map(|class| {
            let alphabet = class.alphabet();
            alphabet[rng.random_range(0..alphabet.len())] as char
        })
        .collect()
}

/// The `ordinal`-th value of the format in ascending alphabet order, with the
/// last position varying fastest. Ordinals beyond the value space wrap around.
pub fn nth(format: &RandomFormat, ordinal: u128) -> String {
    let mut rest = ordinal % format.value_space();
    let mut out = vec![0u8; format.width()];
    for (slot, class) in out.iter_mut().zip(format.classes()).rev() {
        let alphabet = class.alphabet();
        let radix = alphabet.len() as u128;
        *slot = alphabet[(rest % radix) as usize];
        rest /= radix;
    }
    out.into_iter().map(char::from).collect()
}
