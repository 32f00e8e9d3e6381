//! # HCP 孪晶模式
//!
//! 四种孪晶模式的 K1 面、η1 方向、剪切坐标系基矢与孪晶切变量。
//!
//! 剪切坐标系 `[e1, e2, e3]` 以母相晶格为单位：e1 = η1，e2 ⊂ K1 且与 e1 正交，
//! e3 恰好跨越一个 K1 面间距。三者构成右手系。
//!
//! ## 依赖关系
//! - 被 `crystal/shear.rs`, `crystal/twinboundary.rs` 使用

use crate::error::{Result, TwinflowError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HCP 孪晶模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwinMode {
    /// {10-12}<-1011>
    #[serde(rename = "10-12")]
    T1012,
    /// {10-11}<10-1-2>
    #[serde(rename = "10-11")]
    T1011,
    /// {11-21}<-1-126>
    #[serde(rename = "11-21")]
    T1121,
    /// {11-22}<11-2-3>
    #[serde(rename = "11-22")]
    T1122,
}

impl FromStr for TwinMode {
    type Err = TwinflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "10-12" => Ok(TwinMode::T1012),
            "10-11" => Ok(TwinMode::T1011),
            "11-21" => Ok(TwinMode::T1121),
            "11-22" => Ok(TwinMode::T1122),
            other => Err(TwinflowError::UnknownTwinMode(other.to_string())),
        }
    }
}

impl fmt::Display for TwinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TwinMode::T1012 => "10-12",
            TwinMode::T1011 => "10-11",
            TwinMode::T1121 => "11-21",
            TwinMode::T1122 => "11-22",
        };
        write!(f, "{}", s)
    }
}

/// Miller-Bravais 方向 [UVTW] 转三指数 [uvw]
pub fn four_to_three_direction(uvtw: [i32; 4]) -> [i32; 3] {
    let [u, v, t, w] = uvtw;
    [u - t, v - t, w]
}

/// Miller-Bravais 晶面 (hkil) 转三指数 (hkl)
pub fn four_to_three_plane(hkil: [i32; 4]) -> [i32; 3] {
    [hkil[0], hkil[1], hkil[3]]
}

impl TwinMode {
    /// 所有模式
    pub const ALL: [TwinMode; 4] = [
        TwinMode::T1012,
        TwinMode::T1011,
        TwinMode::T1121,
        TwinMode::T1122,
    ];

    /// K1 面（四指数）
    pub fn k1_plane_hkil(&self) -> [i32; 4] {
        match self {
            TwinMode::T1012 => [1, 0, -1, 2],
            TwinMode::T1011 => [1, 0, -1, 1],
            TwinMode::T1121 => [1, 1, -2, 1],
            TwinMode::T1122 => [1, 1, -2, 2],
        }
    }

    /// K1 面（三指数）
    pub fn k1_plane(&self) -> [i32; 3] {
        four_to_three_plane(self.k1_plane_hkil())
    }

    /// η2 方向（三指数），孪晶切变把它映射到关于 K1 的镜像
    pub fn eta2(&self) -> [i32; 3] {
        match self {
            TwinMode::T1012 => four_to_three_direction([1, 0, -1, 1]),
            TwinMode::T1011 => four_to_three_direction([3, 0, -3, 2]),
            TwinMode::T1121 => [1, 1, 0],
            TwinMode::T1122 => [2, 2, 1],
        }
    }

    /// 剪切坐标系基矢（行：e1 = η1, e2, e3）
    pub fn shear_basis(&self) -> [[i32; 3]; 3] {
        match self {
            TwinMode::T1012 => [[2, 1, -1], [0, 1, 0], [1, 0, 0]],
            TwinMode::T1011 => [[2, 1, -2], [0, 1, 0], [0, 0, 1]],
            TwinMode::T1121 => [[-1, -1, 2], [1, -1, 0], [1, 0, 0]],
            TwinMode::T1122 => [[1, 1, -1], [-1, 1, 0], [1, 0, 0]],
        }
    }

    /// 带符号的孪晶切变量，沿 e1 方向为正；r = c/a
    pub fn signed_shear(&self, r: f64) -> f64 {
        let sqrt3 = 3f64.sqrt();
        match self {
            TwinMode::T1012 => (r * r - 3.0) / (sqrt3 * r),
            TwinMode::T1011 => (4.0 * r * r - 9.0) / (4.0 * sqrt3 * r),
            TwinMode::T1121 => 1.0 / r,
            TwinMode::T1122 => 2.0 * (r * r - 2.0) / (3.0 * r),
        }
    }

    /// 孪晶切变量的绝对值
    pub fn shear_value(&self, r: f64) -> f64 {
        self.signed_shear(r).abs()
    }
}
