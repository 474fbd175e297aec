// 构建脚本: 静态链接 FFmpeg 时补充系统库
fn main() {
    // 仅 Windows MSVC 下 vcpkg 的 FFmpeg 静态库需要
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // 硬件解码 (Intel QSV)
        println!("cargo:rustc-link-lib=dylib=libmfx");

        // vcpkg 的 FFmpeg 默认带 x264
        println!("cargo:rustc-link-lib=dylib=libx264");

        // FFmpeg 的 Windows 平台依赖
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");
        println!("cargo:rustc-link-lib=dylib=secur32");
    }
}
