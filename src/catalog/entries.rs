use super::{Category, CleanupMethod, LocationDescriptor, Priority};

pub(super) fn all() -> Vec<LocationDescriptor> {
    let mut locations = high_priority();
    locations.extend(medium_priority());
    locations.extend(low_priority());
    locations.extend(view_only());
    locations
}

fn high_priority() -> Vec<LocationDescriptor> {
    vec![
        LocationDescriptor::new(
            "Windows.old",
            r"%SystemDrive%\Windows.old",
            Category::System,
            Priority::Critical,
        )
        .admin()
        .method(CleanupMethod::TakeOwnership)
        .expected_mb(15000)
        .description("Previous Windows installation backup")
        .warning("Only delete if >30 days since upgrade and system is stable"),
        LocationDescriptor::new(
            "Windows Upgrade Files ($Windows.~BT)",
            r"%SystemDrive%\$Windows.~BT",
            Category::System,
            Priority::Critical,
        )
        .admin()
        .method(CleanupMethod::TakeOwnership)
        .expected_mb(10000)
        .description("Windows upgrade temporary files"),
        LocationDescriptor::new(
            "Windows Upgrade Files ($Windows.~WS)",
            r"%SystemDrive%\$Windows.~WS",
            Category::System,
            Priority::Critical,
        )
        .admin()
        .method(CleanupMethod::TakeOwnership)
        .expected_mb(5000)
        .description("Windows setup temporary files"),
        LocationDescriptor::new(
            "WinRE Agent Files",
            r"%SystemDrive%\$WinREAgent",
            Category::System,
            Priority::High,
        )
        .admin()
        .expected_mb(1000)
        .description("Windows Recovery Environment agent files"),
        LocationDescriptor::with_paths(
            "Windows Error Reporting - ReportQueue",
            [
                r"%ProgramData%\Microsoft\Windows\WER\ReportQueue",
                r"%LOCALAPPDATA%\Microsoft\Windows\WER\ReportQueue",
            ],
            Category::System,
            Priority::High,
        )
        .expected_mb(5000)
        .description("Windows Error Reporting crash reports"),
        LocationDescriptor::with_paths(
            "Windows Error Reporting - ReportArchive",
            [
                r"%ProgramData%\Microsoft\Windows\WER\ReportArchive",
                r"%LOCALAPPDATA%\Microsoft\Windows\WER\ReportArchive",
            ],
            Category::System,
            Priority::High,
        )
        .expected_mb(3000)
        .description("Archived crash reports"),
        LocationDescriptor::new(
            "Application Crash Dumps",
            r"%LOCALAPPDATA%\CrashDumps",
            Category::System,
            Priority::High,
        )
        .expected_mb(2000)
        .description("User-mode application crash dumps"),
        LocationDescriptor::new(
            "Memory Dump Files",
            r"%SystemRoot%\MEMORY.DMP",
            Category::System,
            Priority::High,
        )
        .admin()
        .file()
        .expected_mb(16000)
        .description("Complete/Kernel memory dumps (BSOD)"),
        LocationDescriptor::new(
            "Minidump Files",
            r"%SystemRoot%\Minidump",
            Category::System,
            Priority::High,
        )
        .admin()
        .expected_mb(500)
        .description("Small memory dumps (256KB each)"),
        LocationDescriptor::new(
            "Live Kernel Reports",
            r"%SystemRoot%\LiveKernelReports",
            Category::System,
            Priority::High,
        )
        .admin()
        .expected_mb(1000)
        .description("Kernel crash reports"),
        LocationDescriptor::with_paths(
            "CBS Logs (Component Based Servicing)",
            [r"%SystemRoot%\Logs\CBS\CBS.log", r"%SystemRoot%\Logs\CBS"],
            Category::Logs,
            Priority::Critical,
        )
        .admin()
        .stop_service("TrustedInstaller")
        .expected_mb(10000)
        .description("Windows Update and component servicing logs")
        .warning("Can grow to 20+ GB in buggy situations"),
        LocationDescriptor::new(
            "Delivery Optimization Cache",
            r"%SystemRoot%\SoftwareDistribution\DeliveryOptimization",
            Category::System,
            Priority::High,
        )
        .admin()
        .expected_mb(10000)
        .description("P2P Windows Update distribution cache"),
        LocationDescriptor::new(
            "Windows Defender Scan History",
            r"%ProgramData%\Microsoft\Windows Defender\Scans\History",
            Category::System,
            Priority::High,
        )
        .admin()
        .stop_service("WinDefend")
        .expected_mb(15000)
        .description("Windows Defender scan cache files (mpcache-*.bin)")
        .warning("Can grow to 20+ GB with large cache files"),
        LocationDescriptor::new(
            "Diagnostic ETL Logs",
            r"%ProgramData%\Microsoft\Diagnosis\ETLLogs",
            Category::Logs,
            Priority::Critical,
        )
        .admin()
        .method(CleanupMethod::Elevated)
        .expected_mb(30000)
        .description("Windows telemetry and diagnostic data")
        .warning("Often overlooked but can be HUGE (50+ GB)"),
    ]
}

fn medium_priority() -> Vec<LocationDescriptor> {
    vec![
        LocationDescriptor::new("Windows Temp", r"%SystemRoot%\Temp", Category::System, Priority::Medium)
            .admin()
            .expected_mb(500)
            .description("System-wide temporary files"),
        LocationDescriptor::new("User Temp", "%TEMP%", Category::System, Priority::Medium)
            .expected_mb(3000)
            .description("User temporary files"),
        LocationDescriptor::new(
            "Windows Update Cache",
            r"%SystemRoot%\SoftwareDistribution\Download",
            Category::System,
            Priority::Medium,
        )
        .admin()
        .stop_service("wuauserv")
        .expected_mb(2000)
        .description("Downloaded Windows updates"),
        LocationDescriptor::new("Prefetch", r"%SystemRoot%\Prefetch", Category::System, Priority::Low)
            .admin()
            .expected_mb(100)
            .description("Application prefetch data"),
        // Browsers
        LocationDescriptor::new(
            "Chrome Cache",
            r"%LOCALAPPDATA%\Google\Chrome\User Data\Default\Cache",
            Category::Browser,
            Priority::Medium,
        )
        .check_processes(&["chrome.exe"])
        .expected_mb(1000)
        .description("Google Chrome cache"),
        LocationDescriptor::new(
            "Edge Cache",
            r"%LOCALAPPDATA%\Microsoft\Edge\User Data\Default\Cache",
            Category::Browser,
            Priority::Medium,
        )
        .check_processes(&["msedge.exe"])
        .expected_mb(1000)
        .description("Microsoft Edge cache"),
        LocationDescriptor::new(
            "Firefox Cache",
            r"%LOCALAPPDATA%\Mozilla\Firefox\Profiles",
            Category::Browser,
            Priority::Medium,
        )
        .check_processes(&["firefox.exe"])
        .expected_mb(1000)
        .description("Mozilla Firefox cache"),
        // Applications
        LocationDescriptor::with_paths(
            "Discord Cache",
            [
                r"%APPDATA%\Discord\Cache",
                r"%APPDATA%\Discord\Code Cache",
                r"%APPDATA%\Discord\GPUCache",
            ],
            Category::Application,
            Priority::Medium,
        )
        .check_processes(&["Discord.exe"])
        .expected_mb(5000)
        .description("Discord cached images and media"),
        LocationDescriptor::with_paths(
            "Microsoft Teams Cache (Classic)",
            [
                r"%APPDATA%\Microsoft\Teams\Application Cache",
                r"%APPDATA%\Microsoft\Teams\Cache",
                r"%APPDATA%\Microsoft\Teams\blob_storage",
                r"%APPDATA%\Microsoft\Teams\databases",
                r"%APPDATA%\Microsoft\Teams\GPUcache",
                r"%APPDATA%\Microsoft\Teams\IndexedDB",
                r"%APPDATA%\Microsoft\Teams\Local Storage",
                r"%APPDATA%\Microsoft\Teams\tmp",
            ],
            Category::Application,
            Priority::Medium,
        )
        .check_processes(&["Teams.exe"])
        .expected_mb(2000)
        .description("Microsoft Teams cache (Classic version)"),
        LocationDescriptor::with_paths(
            "Slack Cache",
            [r"%APPDATA%\Slack\Cache", r"%APPDATA%\Slack\Code Cache"],
            Category::Application,
            Priority::Medium,
        )
        .check_processes(&["slack.exe"])
        .expected_mb(2000)
        .description("Slack message and file cache"),
        LocationDescriptor::new(
            "Spotify Cache",
            r"%LOCALAPPDATA%\Spotify\Data",
            Category::Application,
            Priority::Medium,
        )
        .check_processes(&["Spotify.exe"])
        .expected_mb(10000)
        .description("Spotify streaming cache")
        .warning("Can be configured to use up to 10% of free disk space"),
        LocationDescriptor::with_paths(
            "Zoom Cache",
            [r"%APPDATA%\Zoom\logs", r"%APPDATA%\Zoom\cache"],
            Category::Application,
            Priority::Low,
        )
        .expected_mb(500)
        .description("Zoom meeting logs and cache"),
        // Gaming
        LocationDescriptor::new(
            "NVIDIA DXCache",
            r"%LOCALAPPDATA%\NVIDIA\DXCache",
            Category::Gaming,
            Priority::Medium,
        )
        .expected_mb(5000)
        .description("NVIDIA DirectX shader cache"),
        LocationDescriptor::new(
            "NVIDIA GLCache",
            r"%LOCALAPPDATA%\NVIDIA\GLCache",
            Category::Gaming,
            Priority::Medium,
        )
        .expected_mb(2000)
        .description("NVIDIA OpenGL shader cache"),
        LocationDescriptor::new(
            "AMD DXCache",
            r"%LOCALAPPDATA%\AMD\DxCache",
            Category::Gaming,
            Priority::Medium,
        )
        .expected_mb(3000)
        .description("AMD DirectX shader cache"),
        LocationDescriptor::new(
            "AMD VkCache",
            r"%LOCALAPPDATA%\AMD\VkCache",
            Category::Gaming,
            Priority::Medium,
        )
        .expected_mb(2000)
        .description("AMD Vulkan shader cache"),
        LocationDescriptor::new(
            "Intel Shader Cache",
            r"%LOCALAPPDATA%\Intel\ShaderCache",
            Category::Gaming,
            Priority::Medium,
        )
        .expected_mb(1000)
        .description("Intel GPU shader cache"),
        LocationDescriptor::with_paths(
            "DirectX Shader Cache",
            [r"%LOCALAPPDATA%\D3DSCache", r"%LOCALAPPDATA%\Microsoft\D3DSCache"],
            Category::Gaming,
            Priority::Medium,
        )
        .expected_mb(3000)
        .description("DirectX shader cache"),
        // Development
        LocationDescriptor::with_paths(
            "npm Cache",
            [r"%APPDATA%\npm-cache", r"%LOCALAPPDATA%\npm-cache"],
            Category::Development,
            Priority::Medium,
        )
        .expected_mb(5000)
        .description("Node.js package manager cache"),
        LocationDescriptor::new(
            "pip Cache",
            r"%LOCALAPPDATA%\pip\cache",
            Category::Development,
            Priority::Medium,
        )
        .expected_mb(2000)
        .description("Python package installer cache"),
        // Cloud
        LocationDescriptor::new(
            "OneDrive Logs",
            r"%LOCALAPPDATA%\Microsoft\OneDrive\logs",
            Category::Cloud,
            Priority::Low,
        )
        .check_processes(&["OneDrive.exe"])
        .expected_mb(200)
        .description("OneDrive sync client logs"),
    ]
}

fn low_priority() -> Vec<LocationDescriptor> {
    vec![
        LocationDescriptor::new(
            "Windows Explorer Thumbnails",
            r"%LOCALAPPDATA%\Microsoft\Windows\Explorer\thumbcache_*.db",
            Category::System,
            Priority::Low,
        )
        .file()
        .expected_mb(200)
        .description("Cached thumbnail images"),
        LocationDescriptor::new(
            "IE Cache",
            r"%LOCALAPPDATA%\Microsoft\Windows\INetCache",
            Category::Browser,
            Priority::Low,
        )
        .expected_mb(100)
        .description("Internet Explorer cache"),
        LocationDescriptor::new(
            "Icon Cache",
            r"%LOCALAPPDATA%\Microsoft\Windows\Explorer\iconcache_*.db",
            Category::System,
            Priority::Low,
        )
        .method(CleanupMethod::RestartShell {
            process: "explorer.exe".to_string(),
        })
        .file()
        .expected_mb(200)
        .description("Cached icon images")
        .warning("Requires explorer.exe restart"),
        LocationDescriptor::with_paths(
            "Font Cache",
            [
                r"%SystemRoot%\ServiceProfiles\LocalService\AppData\Local\FontCache",
                r"%SystemRoot%\System32\FNTCACHE.DAT",
            ],
            Category::System,
            Priority::Low,
        )
        .admin()
        .stop_service("FontCache")
        .expected_mb(50)
        .description("Font rendering cache"),
        LocationDescriptor::new(
            "Recent Documents",
            r"%APPDATA%\Microsoft\Windows\Recent",
            Category::System,
            Priority::Low,
        )
        .expected_mb(50)
        .description("Recently used files and jump lists"),
        LocationDescriptor::new(
            "Notification Cache",
            r"%LOCALAPPDATA%\Microsoft\Windows\Notifications\wpndatabase.db*",
            Category::System,
            Priority::Low,
        )
        .file()
        .expected_mb(50)
        .description("Windows notification history"),
        LocationDescriptor::new(
            "Cryptnet URL Cache",
            r"%USERPROFILE%\AppData\LocalLow\Microsoft\CryptnetUrlCache",
            Category::System,
            Priority::Low,
        )
        .expected_mb(100)
        .description("Certificate revocation list cache"),
        LocationDescriptor::new(
            "Windows Store Cache",
            r"%LOCALAPPDATA%\Packages\Microsoft.WindowsStore_8wekyb3d8bbwe\LocalCache",
            Category::System,
            Priority::Low,
        )
        .expected_mb(500)
        .description("Microsoft Store cache"),
    ]
}

fn view_only() -> Vec<LocationDescriptor> {
    vec![
        LocationDescriptor::new(
            "Windows Installer Cache",
            r"%SystemRoot%\Installer",
            Category::ViewOnly,
            Priority::Never,
        )
        .admin()
        .method(CleanupMethod::DisplayOnly)
        .expected_mb(30000)
        .description("MSI installer cache - NEVER DELETE")
        .warning("Deleting breaks application repair, uninstall, and updates"),
        LocationDescriptor::new(
            "WinSxS Component Store",
            r"%SystemRoot%\WinSxS",
            Category::ViewOnly,
            Priority::Never,
        )
        .admin()
        .method(CleanupMethod::ComponentStore)
        .expected_mb(10000)
        .description("Windows component store - Use DISM only")
        .warning("Only clean with: tempsweep component-store"),
    ]
}
