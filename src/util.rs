//! Small helpers shared across the wire-format codecs.

/// Dumps out the slice in a pretty way, for debug logging of raw wire bytes.
pub fn hexdump(slice: &[u8]) -> String {
    const WIDTH: usize = 16;
    let mut out = String::new();
    let mut offset = 0;

    for row in slice.chunks(WIDTH) {
        let row_hex: String = row.iter().map(|x| format!("{:02X} ", x)).collect();

        let row_str: String = row
            .iter()
            .map(|x| {
                if x.is_ascii_graphic() || *x == b' ' {
                    *x as char
                } else {
                    '.'
                }
            })
            .collect();

        out.push_str(&format!("{:>08x}: {:<48} {}\n", offset, row_hex, row_str));
        offset += WIDTH;
    }

    out
}

/// Clamps `v` into `[min, max]`.
pub fn clamp<T: PartialOrd>(v: T, min: T, max: T) -> T {
    assert!(min < max);

    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}
