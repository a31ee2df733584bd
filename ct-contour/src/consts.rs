//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 二值图像中的背景像素值.
    pub const BINARY_BACKGROUND: u8 = BLACK;

    /// 二值图像中的前景像素值.
    pub const BINARY_FOREGROUND: u8 = WHITE;
}

/// 三通道颜色.
pub mod rgb {
    /// 导出轮廓图像所用的轮廓颜色 (绿色).
    pub const CONTOUR: [u8; 3] = [0, 255, 0];

    /// 导出轮廓图像的画布底色 (黑色).
    pub const CANVAS: [u8; 3] = [0, 0, 0];
}

/// 体数据缓存 / 体模式导出目录名, 位于源文件夹下.
pub const CACHE_DIR_NAME: &str = "saved_dicom_imgs";

/// 体数据缓存文件名.
pub const CACHE_FILE_NAME: &str = "output.npy";

/// 平面图像模式下的导出目录名, 位于源文件夹下.
pub const FLAT_EXPORT_DIR_NAME: &str = "saved_contours";

/// DICOM 文件扩展名 (小写).
pub const DICOM_EXTENSION: &str = "dcm";

/// 平面图像模式下可识别的图像扩展名 (小写).
pub const BITMAP_EXTENSIONS: [&str; 6] = ["bmp", "png", "jpg", "jpeg", "tif", "tiff"];

/// 背景图像导出文件的后缀.
pub const BACKGROUND_SUFFIX: &str = "-bkg";

/// 默认阈值.
pub const DEFAULT_THRESHOLD: u8 = 70;

/// 默认平面内放大倍率.
pub const DEFAULT_SCALING_FACTOR: u32 = 4;

/// 导出 id 的十六进制字符数.
pub const EXPORT_ID_LEN: usize = 10;
