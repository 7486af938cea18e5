use ndarray::ArrayD;

/// A numeric array with a validity mask.
///
/// `mask` follows the usual masked-array convention: `true` marks an element
/// as missing. Without a fill value every element is valid.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray {
    pub data: ArrayD<f64>,
    pub mask: ArrayD<bool>,
    pub fill_value: Option<f64>,
}

impl MaskedArray {
    pub fn new(data: ArrayD<f64>, fill_value: Option<f64>) -> Self {
        let mask = match fill_value {
            Some(fill) if fill.is_nan() => data.mapv(f64::is_nan),
            Some(fill) => data.mapv(|v| v == fill),
            None => ArrayD::from_elem(data.raw_dim(), false),
        };
        Self {
            data,
            mask,
            fill_value,
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn masked_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn valid_count(&self) -> usize {
        self.mask.len() - self.masked_count()
    }

    /// Valid elements in row-major order.
    pub fn valid_values(&self) -> Vec<f64> {
        self.data
            .iter()
            .zip(self.mask.iter())
            .filter(|(_, &masked)| !masked)
            .map(|(&v, _)| v)
            .collect()
    }

    pub fn min(&self) -> Option<f64> {
        self.valid_values().into_iter().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.valid_values().into_iter().reduce(f64::max)
    }

    pub fn mean(&self) -> Option<f64> {
        let values = self.valid_values();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Copy of the data with masked elements replaced by `value`.
    pub fn filled(&self, value: f64) -> ArrayD<f64> {
        let mut out = self.data.clone();
        out.zip_mut_with(&self.mask, |v, &masked| {
            if masked {
                *v = value;
            }
        });
        out
    }
}
