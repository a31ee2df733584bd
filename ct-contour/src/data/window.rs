/// 强度窗口, 包含窗位 (level) 和窗宽 (width). 用于把 16-bit 强度映射为 8-bit 灰度.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntensityWindow {
    level: f32,
    width: f32,
}

impl Default for IntensityWindow {
    #[inline]
    fn default() -> Self {
        Self::clip_8bit()
    }
}

impl IntensityWindow {
    /// 构建强度窗.
    ///
    /// `level` 和 `width` 必须在合理范围内, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<IntensityWindow> {
        if (0.0..=u16::MAX as f32).contains(&level) && 0.0 < width && width <= 2.0 * u16::MAX as f32
        {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 构建一个把 `[0, 255]` 原样映射、其余截断为 255 的窗口.
    ///
    /// 该窗口的窗位为 127.5, 窗宽为 255.
    #[inline]
    pub const fn clip_8bit() -> IntensityWindow {
        Self {
            level: 127.5,
            width: 255.0,
        }
    }

    /// 构建一个覆盖全部 16-bit 范围的窗口.
    #[inline]
    pub const fn full_16bit() -> IntensityWindow {
        Self {
            level: u16::MAX as f32 / 2.0,
            width: u16::MAX as f32,
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 求在当前窗口设置下, 强度 `v` 对应的灰度图像素整数值 (0 <= value <= 255).
    pub fn eval(&self, v: u16) -> u8 {
        let v = v as f32;
        let lb = self.lower_bound();
        if v <= lb {
            u8::MIN
        } else if v >= self.upper_bound() {
            u8::MAX
        } else {
            // 255, not 256.
            (((v - lb) / self.width()) * 255.0).round() as u8
        }
    }
}
