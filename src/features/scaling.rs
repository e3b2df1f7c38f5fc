//! Z-score scaling fitted on the training partition

use crate::{Result, TransferError};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Per-column mean and population standard deviation
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
    constant: Vec<bool>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(TransferError::EmptyData(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| TransferError::EmptyData("no rows".to_string()))?;
        let std = x.std_axis(Axis(0), 0.0);

        let constant: Vec<bool> = std.iter().map(|s| *s <= f64::EPSILON).collect();
        let scale = std.mapv(|s| if s <= f64::EPSILON { 1.0 } else { s });

        Ok(StandardScaler {
            mean,
            scale,
            constant,
        })
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(TransferError::DimensionMismatch {
                expected: self.mean.len(),
                actual: x.ncols(),
            });
        }
        Ok((&x - &self.mean) / &self.scale)
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// Columns that carry no variance in the data the scaler was fitted on
    pub fn constant_columns(&self) -> Vec<usize> {
        self.constant
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| c.then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform() {
        let train = array![[1.0, 10.0, 5.0], [3.0, 30.0, 5.0]];
        let scaler = StandardScaler::fit(train.view()).unwrap();

        assert_eq!(scaler.mean(), &array![2.0, 20.0, 5.0]);
        assert_eq!(scaler.scale(), &array![1.0, 10.0, 1.0]);
        assert_eq!(scaler.constant_columns(), vec![2]);

        let scaled = scaler.transform(train.view()).unwrap();
        assert_eq!(scaled, array![[-1.0, -1.0, 0.0], [1.0, 1.0, 0.0]]);

        let test = array![[4.0, 20.0, 7.0]];
        let scaled = scaler.transform(test.view()).unwrap();
        assert_eq!(scaled, array![[2.0, 0.0, 2.0]]);
    }

    #[test]
    fn test_column_mismatch() {
        let scaler = StandardScaler::fit(array![[1.0, 2.0]].view()).unwrap();
        let err = scaler.transform(array![[1.0]].view()).unwrap_err();
        assert!(matches!(
            err,
            TransferError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_empty_fit() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(empty.view()).is_err());
    }
}
