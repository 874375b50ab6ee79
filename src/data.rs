//! Borrowed byte spans and their scalar conversions.
//!
//! A [`DataView`] never owns bytes; it stays valid for exactly as long as
//! the input buffer the caller handed to [`crate::load`]. The `is_binary`
//! flag decides how a span converts to a scalar: exact-width little-endian
//! reinterpretation for the binary container, locale-independent
//! parse-as-zero scanning for the text dialect.

/// A `[begin, end)` span into the source buffer plus the format flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataView<'a> {
    pub bytes: &'a [u8],
    pub is_binary: bool,
}

impl Default for DataView<'_> {
    fn default() -> Self {
        DataView {
            bytes: &[],
            is_binary: true,
        }
    }
}

impl<'a> DataView<'a> {
    pub(crate) fn binary(bytes: &'a [u8]) -> Self {
        DataView {
            bytes,
            is_binary: true,
        }
    }

    pub(crate) fn text(bytes: &'a [u8]) -> Self {
        DataView {
            bytes,
            is_binary: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Lossy UTF-8 copy of the whole span.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.bytes).into_owned()
    }

    pub fn to_i32(&self) -> i32 {
        if self.is_binary {
            match self.bytes.try_into() {
                Ok(b) => i32::from_le_bytes(b),
                Err(_) => 0,
            }
        } else {
            atoi_prefix(self.bytes) as i32
        }
    }

    pub fn to_u32(&self) -> u32 {
        self.to_u64() as u32
    }

    pub fn to_i64(&self) -> i64 {
        if self.is_binary {
            match self.bytes.len() {
                8 => i64::from_le_bytes(self.bytes.try_into().unwrap()),
                4 => i32::from_le_bytes(self.bytes.try_into().unwrap()) as i64,
                _ => 0,
            }
        } else {
            atoi_prefix(self.bytes)
        }
    }

    pub fn to_u64(&self) -> u64 {
        if self.is_binary {
            match self.bytes.len() {
                8 => u64::from_le_bytes(self.bytes.try_into().unwrap()),
                4 => u32::from_le_bytes(self.bytes.try_into().unwrap()) as u64,
                _ => 0,
            }
        } else {
            atou_prefix(self.bytes)
        }
    }

    pub fn to_f32(&self) -> f32 {
        if self.is_binary {
            match self.bytes.len() {
                4 => f32::from_le_bytes(self.bytes.try_into().unwrap()),
                8 => f64::from_le_bytes(self.bytes.try_into().unwrap()) as f32,
                _ => 0.,
            }
        } else {
            atof_prefix(self.bytes) as f32
        }
    }

    pub fn to_f64(&self) -> f64 {
        if self.is_binary {
            match self.bytes.len() {
                8 => f64::from_le_bytes(self.bytes.try_into().unwrap()),
                4 => f32::from_le_bytes(self.bytes.try_into().unwrap()) as f64,
                _ => 0.,
            }
        } else {
            atof_prefix(self.bytes)
        }
    }

    /// Scans up to `out.len()` comma-separated floats from a text span,
    /// for aggregate-valued properties (vectors, matrices). Returns how
    /// many slots were filled; a short span stops early and leaves the
    /// remaining slots untouched.
    pub fn read_floats(&self, out: &mut [f64]) -> usize {
        read_f64_seq(self.bytes, out)
    }
}

impl PartialEq<[u8]> for DataView<'_> {
    fn eq(&self, rhs: &[u8]) -> bool {
        self.bytes == rhs
    }
}

impl PartialEq<&str> for DataView<'_> {
    fn eq(&self, rhs: &&str) -> bool {
        self.bytes == rhs.as_bytes()
    }
}

/// `atoll`-equivalent: leading whitespace, optional sign, longest digit run.
/// Malformed input parses as zero; this is the documented loose contract of
/// the text dialect, kept for compatibility with existing exporters.
pub(crate) fn atoi_prefix(s: &[u8]) -> i64 {
    let s = trim_start(s);
    let (neg, s) = match s.first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits = digit_run(s);
    let mut v: i64 = 0;
    for &d in digits {
        v = v.wrapping_mul(10).wrapping_add((d - b'0') as i64);
    }
    if neg {
        v.wrapping_neg()
    } else {
        v
    }
}

/// `strtoull`-equivalent, including the wrap-on-minus behavior.
pub(crate) fn atou_prefix(s: &[u8]) -> u64 {
    let s = trim_start(s);
    let (neg, s) = match s.first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits = digit_run(s);
    let mut v: u64 = 0;
    for &d in digits {
        v = v.wrapping_mul(10).wrapping_add((d - b'0') as u64);
    }
    if neg {
        v.wrapping_neg()
    } else {
        v
    }
}

/// `atof`-equivalent over the longest float-looking prefix.
pub(crate) fn atof_prefix(s: &[u8]) -> f64 {
    let s = trim_start(s);
    let mut end = 0;
    if matches!(s.first(), Some(b'-' | b'+')) {
        end += 1;
    }
    while end < s.len() && s[end].is_ascii_digit() {
        end += 1;
    }
    if s.get(end) == Some(&b'.') {
        end += 1;
        while end < s.len() && s[end].is_ascii_digit() {
            end += 1;
        }
    }
    if matches!(s.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(s.get(exp), Some(b'-' | b'+')) {
            exp += 1;
        }
        if s.get(exp).is_some_and(|c| c.is_ascii_digit()) {
            while exp < s.len() && s[exp].is_ascii_digit() {
                exp += 1;
            }
            end = exp;
        }
    }
    std::str::from_utf8(&s[..end])
        .ok()
        .and_then(|t| t.parse().ok())
        .unwrap_or(0.)
}

/// Reads up to `out.len()` comma-separated floats from `s`, stopping early
/// when the span is exhausted. Unfilled slots are left untouched, so short
/// inputs degrade to partially-zero aggregates by design.
fn read_f64_seq(s: &[u8], out: &mut [f64]) -> usize {
    let mut s = s;
    let mut n = 0;
    for slot in out.iter_mut() {
        *slot = atof_prefix(s);
        n += 1;
        match s.iter().position(|&c| c == b',') {
            Some(i) => s = &s[i + 1..],
            None => break,
        }
        if s.is_empty() {
            break;
        }
    }
    n
}

fn trim_start(s: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < s.len() && s[i].is_ascii_whitespace() {
        i += 1;
    }
    &s[i..]
}

fn digit_run(s: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < s.len() && s[i].is_ascii_digit() {
        i += 1;
    }
    &s[..i]
}

#[test]
fn test_binary_scalars() {
    let i64_bytes = 42i64.to_le_bytes();
    let v = DataView::binary(&i64_bytes);
    assert_eq!(v.to_i64(), 42);
    assert_eq!(v.to_u64(), 42);
    let f32_bytes = 1.5f32.to_le_bytes();
    let v = DataView::binary(&f32_bytes);
    assert_eq!(v.to_f32(), 1.5);
    assert_eq!(v.to_f64(), 1.5);
}

#[test]
fn test_text_scalars() {
    let v = DataView::text(b"-117");
    assert_eq!(v.to_i64(), -117);
    assert_eq!(v.to_i32(), -117);
    let v = DataView::text(b"10.5e-3");
    assert!((v.to_f64() - 0.0105).abs() < 1e-12);
    // malformed text parses as zero, not an error
    let v = DataView::text(b"bogus");
    assert_eq!(v.to_i64(), 0);
    assert_eq!(v.to_f64(), 0.);
}

#[test]
fn test_f64_seq_short_input() {
    let mut out = [0.; 4];
    let n = read_f64_seq(b"1.0,2.0", &mut out);
    assert_eq!(n, 2);
    assert_eq!(out, [1., 2., 0., 0.]);
}
