//! Coder configuration and the validated schema derived from it.

use crate::construct;
use crate::error::Error;

/// Slice granularity the MSR layer aims for when none is configured.
pub const DEFAULT_SLICE_BYTES: usize = 1024;

/// Which code a coder implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodeFamily {
    /// Systematic Reed-Solomon over a Cauchy matrix.
    #[default]
    ReedSolomon,
    /// Minimum-storage regenerating code with sub-packetization `r^(n/r)`.
    Msr,
}

/// How the MSR layer presents sub-units to the coding kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BufferMode {
    /// Gather each sub-unit into an owned buffer, code, scatter back.
    Copy,
    /// Code directly over borrowed windows of the caller's buffers.
    #[default]
    View,
}

/// Caller-facing coder options.
///
/// ```
/// use regen_ec::{CodeFamily, CoderOptions};
///
/// let options = CoderOptions::new(3, 3)
///     .family(CodeFamily::Msr)
///     .slice_unit(9);
/// assert_eq!(options.data_units, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoderOptions {
    pub data_units: usize,
    pub parity_units: usize,
    pub family: CodeFamily,
    /// Derive decode matrices by row-reducing the parity-check matrix.
    pub use_pcm: bool,
    /// Accepted for compatibility. Inputs are borrowed immutably and are
    /// never modified either way.
    pub allow_input_mutation: bool,
    /// Dump matrices and tables through `tracing` at debug level.
    pub allow_verbose_dump: bool,
    /// MSR slice granularity in bytes; must be a multiple of `l`.
    pub slice_unit: Option<usize>,
    pub buffer_mode: BufferMode,
}

impl CoderOptions {
    pub fn new(data_units: usize, parity_units: usize) -> Self {
        Self {
            data_units,
            parity_units,
            family: CodeFamily::default(),
            use_pcm: false,
            allow_input_mutation: false,
            allow_verbose_dump: false,
            slice_unit: None,
            buffer_mode: BufferMode::default(),
        }
    }

    pub fn family(mut self, family: CodeFamily) -> Self {
        self.family = family;
        self
    }

    pub fn use_pcm(mut self, use_pcm: bool) -> Self {
        self.use_pcm = use_pcm;
        self
    }

    pub fn allow_input_mutation(mut self, allow: bool) -> Self {
        self.allow_input_mutation = allow;
        self
    }

    pub fn allow_verbose_dump(mut self, allow: bool) -> Self {
        self.allow_verbose_dump = allow;
        self
    }

    pub fn slice_unit(mut self, bytes: usize) -> Self {
        self.slice_unit = Some(bytes);
        self
    }

    pub fn buffer_mode(mut self, mode: BufferMode) -> Self {
        self.buffer_mode = mode;
        self
    }
}

/// Immutable coding parameters, validated once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    data_units: usize,
    parity_units: usize,
    sub_packets: usize,
    family: CodeFamily,
    use_pcm: bool,
    allow_input_mutation: bool,
    allow_verbose_dump: bool,
    slice_unit: usize,
    buffer_mode: BufferMode,
}

impl Schema {
    /// Validate options into a schema.
    ///
    /// # Errors
    /// Returns `InvalidSchema` if:
    /// * `data_units` or `parity_units` is zero, or `n > 255`
    /// * MSR and `parity_units` does not divide `n`, or `l` exceeds
    ///   [`construct::MAX_SUBPACKETIZATION`]
    /// * `slice_unit` is zero or not a multiple of `l`
    pub fn new(options: &CoderOptions) -> Result<Self, Error> {
        let k = options.data_units;
        let r = options.parity_units;
        if k == 0 || r == 0 {
            return Err(Error::InvalidSchema(format!(
                "data and parity unit counts must be positive, got k={k} r={r}"
            )));
        }
        let n = k
            .checked_add(r)
            .filter(|&n| n <= 255)
            .ok_or_else(|| Error::InvalidSchema(format!("n = k + r must be at most 255, got k={k} r={r}")))?;

        let sub_packets = match options.family {
            CodeFamily::ReedSolomon => 1,
            CodeFamily::Msr => construct::msr_subpacketization(n, k).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "MSR needs r | n and r^(n/r) <= {}, got n={n} r={r}",
                    construct::MAX_SUBPACKETIZATION
                ))
            })?,
        };

        let slice_unit = match options.slice_unit {
            Some(g) if g == 0 || g % sub_packets != 0 => {
                return Err(Error::InvalidSchema(format!(
                    "slice unit {g} must be a positive multiple of l={sub_packets}"
                )));
            }
            Some(g) => g,
            None => sub_packets * (DEFAULT_SLICE_BYTES / sub_packets).max(1),
        };

        Ok(Self {
            data_units: k,
            parity_units: r,
            sub_packets,
            family: options.family,
            use_pcm: options.use_pcm,
            allow_input_mutation: options.allow_input_mutation,
            allow_verbose_dump: options.allow_verbose_dump,
            slice_unit,
            buffer_mode: options.buffer_mode,
        })
    }

    /// k
    pub fn data_units(&self) -> usize {
        self.data_units
    }

    /// r
    pub fn parity_units(&self) -> usize {
        self.parity_units
    }

    /// n = k + r
    pub fn total_units(&self) -> usize {
        self.data_units + self.parity_units
    }

    /// l: 1 for Reed-Solomon, `r^(n/r)` for MSR.
    pub fn sub_packets(&self) -> usize {
        self.sub_packets
    }

    pub fn family(&self) -> CodeFamily {
        self.family
    }

    pub fn use_pcm(&self) -> bool {
        self.use_pcm
    }

    pub fn allow_input_mutation(&self) -> bool {
        self.allow_input_mutation
    }

    pub fn allow_verbose_dump(&self) -> bool {
        self.allow_verbose_dump
    }

    /// Bytes per slice block; every MSR unit length must be a multiple.
    pub fn slice_unit(&self) -> usize {
        self.slice_unit
    }

    pub fn buffer_mode(&self) -> BufferMode {
        self.buffer_mode
    }

    /// Sub-units read by a bandwidth-optimal single-node MSR repair.
    pub fn repair_bandwidth(&self) -> usize {
        (self.total_units() - 1) * self.sub_packets / self.parity_units
    }
}
